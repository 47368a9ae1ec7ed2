//! Accept loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionContext, serve_connection};

/// Pause after a failed `accept` so a persistent error does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Accept clients and spawn a worker for each until `shutdown` fires.
///
/// Accept errors are logged once per distinct kind and never end the loop.
pub async fn run_accept_loop(
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    shutdown: CancellationToken,
) {
    let mut last_error = None::<io::ErrorKind>;
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                last_error = None;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                }
                drop(tokio::spawn(serve_connection(stream, peer, Arc::clone(&ctx))));
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(error = %error, "socket accept error");
                }
                last_error = Some(kind);
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }
    }
    info!("listener closed");
}
