//! Per-connection worker: read, dispatch, reply.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vehiculo_core::SessionId;
use vehiculo_logging::WIRE_TARGET;

use crate::codec::{CodecError, CommandCodec, Inbound};
use crate::dispatcher::{Dispatcher, Flow};
use crate::registry::SessionRegistry;
use crate::session::Session;

/// How long a released session may spend flushing its remaining lines.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared services every connection needs.
pub struct ConnectionContext {
    /// Per-line byte limit.
    pub max_line_length: usize,
    /// Outbound queue capacity per session.
    pub send_queue: usize,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Command handler.
    pub dispatcher: Arc<Dispatcher>,
}

/// Removes the session and stops its writer on every exit path.
struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let _ = self.registry.remove(self.session.id());
        self.session.release();
        info!(
            session = %self.session.id(),
            peer = %self.session.peer(),
            dropped_lines = self.session.drop_count(),
            "client disconnected"
        );
    }
}

/// Run one client connection to completion.
pub async fn serve_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnectionContext>) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(ctx.send_queue);
    let session = Arc::new(Session::new(peer, tx));
    ctx.registry.add(Arc::clone(&session));
    let guard = SessionGuard {
        registry: Arc::clone(&ctx.registry),
        session: Arc::clone(&session),
    };
    info!(session = %session.id(), %peer, "client connected");

    let writer = tokio::spawn(write_loop(
        FramedWrite::new(write_half, CommandCodec::new(ctx.max_line_length)),
        rx,
        session.release_token(),
        session.id(),
    ));

    read_loop(
        FramedRead::new(read_half, CommandCodec::new(ctx.max_line_length)),
        &session,
        &ctx.dispatcher,
    )
    .await;

    drop(guard);
    if let Err(e) = writer.await {
        warn!(session = %session.id(), error = %e, "writer task failed");
    }
}

async fn read_loop(
    mut frames: FramedRead<OwnedReadHalf, CommandCodec>,
    session: &Session,
    dispatcher: &Dispatcher,
) {
    let release = session.release_token();
    loop {
        let frame = tokio::select! {
            () = release.cancelled() => {
                debug!(session = %session.id(), "session released");
                break;
            }
            frame = frames.next() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                debug!(session = %session.id(), error = %e, "read failed");
                break;
            }
            None => {
                debug!(session = %session.id(), "peer closed the connection");
                break;
            }
        };

        if let Inbound::Line(line) = &frame {
            if !line.is_empty() {
                info!(target: WIRE_TARGET, "<- {} {}", session.id(), line);
            }
        }

        let outcome = dispatcher.process(session, &frame);
        if !outcome.lines.into_iter().all(|line| session.send(line)) {
            warn!(session = %session.id(), "outbound queue full or closed");
            break;
        }
        if outcome.flow == Flow::Close {
            break;
        }
    }
}

/// Writes queued lines to the socket until release.
///
/// A write blocked on a stalled peer is abandoned at release. Lines already
/// queued at that point get `DRAIN_TIMEOUT` to reach the peer, so a `BYE`
/// queued just before release is still delivered.
async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, CommandCodec>,
    mut rx: mpsc::Receiver<Arc<str>>,
    release: CancellationToken,
    id: SessionId,
) {
    loop {
        let line = tokio::select! {
            line = rx.recv() => match line {
                Some(line) => line,
                None => return,
            },
            () = release.cancelled() => break,
        };
        let written = tokio::select! {
            result = sink.send(Arc::clone(&line)) => result,
            () = release.cancelled() => break,
        };
        if let Err(e) = written {
            debug!(session = %id, error = %e, "write failed");
            release.cancel();
            return;
        }
        info!(target: WIRE_TARGET, "-> {} {}", id, line);
    }

    match tokio::time::timeout(DRAIN_TIMEOUT, drain_queued(&mut sink, &mut rx, id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(session = %id, error = %e, "final flush failed"),
        Err(_) => debug!(session = %id, "peer not reading; queued lines dropped"),
    }
}

/// Write whatever is still queued, then flush and close the sink.
async fn drain_queued(
    sink: &mut FramedWrite<OwnedWriteHalf, CommandCodec>,
    rx: &mut mpsc::Receiver<Arc<str>>,
    id: SessionId,
) -> Result<(), CodecError> {
    rx.close();
    while let Ok(line) = rx.try_recv() {
        sink.feed(Arc::clone(&line)).await?;
        info!(target: WIRE_TARGET, "-> {} {}", id, line);
    }
    sink.close().await
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use vehiculo_auth::AuthManager;
    use vehiculo_core::Vehicle;
    use vehiculo_settings::TokenPolicy;

    fn context() -> Arc<ConnectionContext> {
        context_with_queue(16)
    }

    fn context_with_queue(send_queue: usize) -> Arc<ConnectionContext> {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(Vehicle::new()),
            Arc::clone(&registry),
            Arc::new(AuthManager::new(None, TokenPolicy::LiveSession)),
        ));
        Arc::new(ConnectionContext {
            max_line_length: 256,
            send_queue,
            registry,
            dispatcher,
        })
    }

    async fn connect(ctx: &Arc<ConnectionContext>) -> (TcpStream, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let handle = tokio::spawn(serve_connection(stream, peer, Arc::clone(ctx)));
        (client, handle)
    }

    async fn wait_for_sessions(ctx: &ConnectionContext, n: usize) {
        for _ in 0..100 {
            if ctx.registry.len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} sessions, found {}", ctx.registry.len());
    }

    #[tokio::test]
    async fn quit_replies_bye_then_closes() {
        let ctx = context();
        let (client, handle) = connect(&ctx).await;
        let (read, mut write) = client.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"QUIT\n").await.unwrap();
        let bye = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bye.as_deref(), Some("BYE"));
        let eof = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(eof, None);

        handle.await.unwrap();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn peer_close_removes_session() {
        let ctx = context();
        let (client, handle) = connect(&ctx).await;
        wait_for_sessions(&ctx, 1).await;

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn release_from_outside_ends_worker() {
        let ctx = context();
        let (_client, handle) = connect(&ctx).await;
        wait_for_sessions(&ctx, 1).await;

        let summary = ctx.registry.snapshot().remove(0);
        let session = ctx.registry.get(summary.id).unwrap();
        session.release();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn release_ends_worker_when_peer_never_reads() {
        let ctx = context_with_queue(4);
        // Held open but never read, so the socket buffers fill up.
        let (_client, handle) = connect(&ctx).await;
        wait_for_sessions(&ctx, 1).await;

        let id = ctx.registry.snapshot().remove(0).id;
        let session = ctx.registry.get(id).unwrap();
        let chunk: Arc<str> = Arc::from("x".repeat(4 << 20));
        for _ in 0..256 {
            if !session.send(Arc::clone(&chunk)) {
                break;
            }
        }
        assert!(session.drop_count() > 0, "outbound queue never filled");
        // Let the writer block on the full socket.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let _ = ctx.registry.remove(id);
        session.release();

        tokio::time::timeout(DRAIN_TIMEOUT + Duration::from_secs(3), handle)
            .await
            .expect("worker stuck on a stalled peer")
            .unwrap();
        assert!(ctx.registry.is_empty());
    }
}
