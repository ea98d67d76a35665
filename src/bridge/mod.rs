//! In-page half of the bridge: observes the page and pushes state updates.

pub mod debounce;
pub mod event;
pub mod extract;
pub mod observer;
pub mod poll;
pub mod transport;
pub mod volume;


pub use event::{Bridge, BridgeStats};
pub use transport::BridgeMessage;
pub use volume::VolumeController;

use crate::config::BridgeConfig;
use crate::host::commands::HostCommands;
use crate::page::{Page, PageEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const MESSAGE_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;

/// Everything the host holds on to once a bridge is running.
pub struct BridgeHandle {
    pub commands: HostCommands,
    /// Serialized `STATE_UPDATE` messages, one per emission.
    pub messages: mpsc::Receiver<String>,
    pub shutdown: mpsc::Sender<()>,
    pub task: JoinHandle<BridgeStats>,
}

impl BridgeHandle {
    /// Stops the bridge and waits for its final stats.
    pub async fn stop(self) -> Result<BridgeStats, tokio::task::JoinError> {
        let _ = self.shutdown.send(()).await;
        self.task.await
    }
}

/// Starts a bridge over `page` on the current runtime.
pub fn spawn<P>(
    page: P,
    events: mpsc::UnboundedReceiver<PageEvent>,
    config: BridgeConfig,
    volume: VolumeController,
) -> BridgeHandle
where
    P: Page + Send + 'static,
{
    let (message_tx, messages) = mpsc::channel(MESSAGE_CAPACITY);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (shutdown, shutdown_rx) = mpsc::channel(1);
    let bridge = Bridge::new(page, config, volume.clone(), transport::Transport::new(message_tx));
    let task = tokio::spawn(bridge.listen(events, command_rx, shutdown_rx));
    BridgeHandle {
        commands: HostCommands::new(command_tx, volume),
        messages,
        shutdown,
        task,
    }
}
