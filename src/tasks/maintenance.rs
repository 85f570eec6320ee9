use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::flows::consultation::ROOM_IDLE_TIMEOUT;
use crate::handlers::booking_handlers::owning_session;
use crate::AppState;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub sessions: usize,
    pub wizards: usize,
    pub rooms: usize,
    pub rate_windows: usize,
    pub wizard_locks: usize,
}

/// Spawns the background task that sweeps in-memory state every
/// [`SWEEP_INTERVAL`].
pub fn spawn_maintenance_task(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let report = run_sweep(&state).await;
            if report != SweepReport::default() {
                info!(
                    sessions = report.sessions,
                    wizards = report.wizards,
                    rooms = report.rooms,
                    rate_windows = report.rate_windows,
                    wizard_locks = report.wizard_locks,
                    "Maintenance sweep removed stale entries"
                );
            }
        }
    })
}

/// One pass over everything held in memory:
///  1. expired sessions
///  2. wizards whose session is gone
///  3. ended or idle consultation rooms
///  4. finished rate-limit windows and the session issuance limiter
///  5. wizard locks nobody holds
pub async fn run_sweep(state: &AppState) -> SweepReport {
    let sessions = state.sessions.purge_expired_at(Utc::now());

    let wizards = state.wizards.retain_keys(|key| {
        owning_session(key).map(|session| state.sessions.is_live(session)).unwrap_or(false)
    });

    let rooms = state.rooms.purge_idle(ROOM_IDLE_TIMEOUT).await;

    let now = std::time::Instant::now();
    let rate_windows = state.contact_limiter.purge_expired(now) + state.bookings.purge_expired_limits();
    state.session_limiter.retain_recent();
    state.session_limiter.shrink_to_fit();

    let wizard_locks = state.wizard_locks.prune();

    debug!(
        live_sessions = state.sessions.len(),
        live_wizards = state.wizards.len(),
        live_rooms = state.rooms.len(),
        "Maintenance sweep done"
    );
    SweepReport { sessions, wizards, rooms, rate_windows, wizard_locks }
}
