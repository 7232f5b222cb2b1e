/// Backend: the polling engine that runs off the front-end thread
///
/// This module breaks down the backend into focused components:
/// - `ticker`: cancellable periodic tick tasks (`PollHandle`)
/// - `scheduler`: the loop that owns the session, issues fetches and
///   reconciles their results
mod scheduler;
mod ticker;

pub use scheduler::{Completion, FetchOrigin, Inbound, PollScheduler, SchedulerInbox};
pub use ticker::{PollHandle, Tick, TickKind};

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tokio::runtime::Builder;

use crate::config::PollConfig;
use crate::protocol::{BackendAction, GuiEvent};
use crate::relay::MessageRelay;

/// Run the backend on the calling thread until shutdown.
///
/// Uses a current-thread runtime: every task the scheduler spawns runs
/// cooperatively on this thread.
pub fn run_backend(
    action_rx: Receiver<BackendAction>,
    event_tx: Sender<GuiEvent>,
    relay: Arc<dyn MessageRelay>,
    config: PollConfig,
) {
    let rt = match Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = event_tx.send(GuiEvent::Fatal(format!(
                "Failed to create Tokio runtime: {}",
                e
            )));
            return;
        }
    };

    rt.block_on(async move {
        let (scheduler, inbox) = PollScheduler::new(relay, config, event_tx);
        scheduler.run(inbox, action_rx).await;
    });
}
