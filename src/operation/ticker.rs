//! Cosmetic progress ticker.
//!
//! Nudges a running operation's progress by a pseudo-random amount on a fixed
//! interval. It knows nothing about the server; it only keeps the indicator
//! moving and never crosses [`PROGRESS_CEILING`](super::state::PROGRESS_CEILING).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::{OperationSnapshot, OperationState};

/// Spawn a ticker bound to one generation. It exits on its own once the slot
/// moves to another generation or leaves `Running`.
pub(crate) fn spawn_ticker<T>(
    state: Arc<watch::Sender<OperationSnapshot<T>>>,
    generation: u64,
    interval: Duration,
    max_increment: u8,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    let max_increment = max_increment.max(1);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let increment = rand::thread_rng().gen_range(1..=max_increment);
            let mut live = true;
            state.send_if_modified(|snap| {
                if snap.generation != generation || snap.state != OperationState::Running {
                    live = false;
                    return false;
                }
                snap.advance_progress(increment)
            });
            if !live {
                break;
            }
        }
    })
}
