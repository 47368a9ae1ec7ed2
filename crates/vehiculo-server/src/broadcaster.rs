//! Periodic telemetry fan-out to authenticated sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vehiculo_core::{Vehicle, VehicleState};

use crate::registry::{BroadcastReport, SessionRegistry};

/// Render one telemetry line.
///
/// `TELEMETRY v=<speed, 2 decimals> battery=<int> dir=<N|E|S|W> timestamp=<UTC>`
pub fn telemetry_line(state: &VehicleState, at: DateTime<Utc>) -> String {
    format!(
        "TELEMETRY v={:.2} battery={} dir={} timestamp={}",
        state.speed,
        state.battery,
        state.compass(),
        at.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Drains the battery and pushes telemetry on a fixed period.
pub struct TelemetryBroadcaster {
    vehicle: Arc<Vehicle>,
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl TelemetryBroadcaster {
    /// Create a broadcaster ticking every `interval`.
    pub fn new(vehicle: Arc<Vehicle>, registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self {
            vehicle,
            registry,
            interval,
        }
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick now.
    ///
    /// The vehicle lock is released before the registry lock is taken.
    pub fn tick(&self) -> BroadcastReport {
        let reading = self.vehicle.drain_tick();
        let line: Arc<str> = telemetry_line(&reading, Utc::now()).into();
        let report = self
            .registry
            .for_each_authenticated(|session| session.send(Arc::clone(&line)));
        for id in &report.removed {
            warn!(session = %id, "session dropped during telemetry broadcast");
        }
        debug!(
            delivered = report.delivered,
            battery = reading.battery,
            "telemetry broadcast"
        );
        report
    }

    /// Tick every period until `shutdown` is cancelled. The first tick fires
    /// one full period after spawning.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "telemetry broadcaster started");
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = self.tick();
                    }
                }
            }
            debug!("telemetry broadcaster stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use chrono::TimeZone;
    use tokio::sync::mpsc;
    use vehiculo_core::Token;

    use crate::session::Session;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap()
    }

    fn setup(state: VehicleState) -> (TelemetryBroadcaster, Arc<Vehicle>, Arc<SessionRegistry>) {
        let vehicle = Arc::new(Vehicle::with_state(state));
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = TelemetryBroadcaster::new(
            Arc::clone(&vehicle),
            Arc::clone(&registry),
            Duration::from_secs(10),
        );
        (broadcaster, vehicle, registry)
    }

    fn add_session(
        registry: &SessionRegistry,
        authenticated: bool,
        capacity: usize,
    ) -> (Arc<Session>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = Arc::new(Session::new(SocketAddr::from(([127, 0, 0, 1], 9)), tx));
        if authenticated {
            session.update_state(|s| s.authenticate(Token::from_raw("1".repeat(32))));
        }
        registry.add(Arc::clone(&session));
        (session, rx)
    }

    #[test]
    fn line_format() {
        let state = VehicleState {
            speed: 12.5,
            battery: 87,
            heading: 180,
        };
        assert_eq!(
            telemetry_line(&state, at()),
            "TELEMETRY v=12.50 battery=87 dir=S timestamp=2026-03-01T12:30:05Z"
        );
    }

    #[test]
    fn line_format_at_rest() {
        assert_eq!(
            telemetry_line(&VehicleState::default(), at()),
            "TELEMETRY v=0.00 battery=100 dir=N timestamp=2026-03-01T12:30:05Z"
        );
    }

    #[test]
    fn tick_drains_moving_vehicle() {
        let (broadcaster, vehicle, _registry) = setup(VehicleState {
            speed: 5.0,
            battery: 50,
            heading: 0,
        });
        let _ = broadcaster.tick();
        assert_eq!(vehicle.snapshot().battery, 49);
    }

    #[test]
    fn tick_keeps_idle_battery() {
        let (broadcaster, vehicle, _registry) = setup(VehicleState::default());
        let _ = broadcaster.tick();
        assert_eq!(vehicle.snapshot().battery, 100);
    }

    #[test]
    fn tick_sends_post_drain_reading_to_authenticated_only() {
        let (broadcaster, _vehicle, registry) = setup(VehicleState {
            speed: 2.5,
            battery: 20,
            heading: 90,
        });
        let (_authed, mut authed_rx) = add_session(&registry, true, 4);
        let (_anon, mut anon_rx) = add_session(&registry, false, 4);

        let report = broadcaster.tick();
        assert_eq!(report.delivered, 1);

        let line = authed_rx.try_recv().unwrap();
        assert!(line.starts_with("TELEMETRY v=2.50 battery=19 dir=E timestamp="), "{line}");
        assert!(anon_rx.try_recv().is_err());
    }

    #[test]
    fn tick_removes_session_with_full_queue() {
        let (broadcaster, _vehicle, registry) = setup(VehicleState::default());
        let (stuck, _stuck_rx) = add_session(&registry, true, 1);
        let (_ok, mut ok_rx) = add_session(&registry, true, 4);

        assert!(stuck.send("filler"));
        let report = broadcaster.tick();

        assert_eq!(report.removed, vec![stuck.id()]);
        assert!(stuck.is_released());
        assert_eq!(registry.len(), 1);
        assert!(ok_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_ticks_each_period_until_cancelled() {
        let (broadcaster, vehicle, _registry) = setup(VehicleState {
            speed: 10.0,
            battery: 100,
            heading: 0,
        });
        let shutdown = CancellationToken::new();
        let handle = Arc::new(broadcaster).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(vehicle.snapshot().battery, 100);

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(vehicle.snapshot().battery, 98);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
