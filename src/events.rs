use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Fire-and-forget notifications pushed to the in-page surface. These ride a
/// separate channel from the request/response protocol and expect no reply.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiEvent {
    /// Open the save/organize dialog for a captured link.
    #[serde(rename_all = "camelCase")]
    ToggleDialog {
        tab_id: Option<i64>,
        link_id: String,
        active_url: String,
        title: Option<String>,
    },

    /// Toggle the in-page search overlay.
    #[serde(rename_all = "camelCase")]
    ToggleSearchMode { tab_id: Option<i64> },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver to whoever is listening right now; nobody listening is fine.
    pub fn emit(&self, event: UiEvent) {
        match self.tx.send(event) {
            Ok(receivers) => log::debug!("pushed ui event to {receivers} subscribers"),
            Err(_) => log::debug!("dropped ui event, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
