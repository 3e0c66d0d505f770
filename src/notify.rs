// UI notification boundary
//
// The worker thread reports through `UiCallbacks`. Implementations must be
// safe to call from the worker; `ChannelNotifier` satisfies that by only
// enqueueing, leaving delivery-thread marshaling to the UI layer.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Callbacks invoked on the UI/control side
pub trait UiCallbacks: Send + Sync {
    /// Free-form status text
    fn on_message(&self, text: &str);

    /// Fatal error for the current run
    fn on_error(&self, text: &str);

    /// Pipeline-level state transition, e.g. "State changed to PLAYING"
    fn on_state_changed(&self, text: &str);

    /// Surface, loop and video sink are all ready
    fn on_initialized(&self);
}

/// A notification as queued by [`ChannelNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Message(String),
    Error(String),
    StateChanged(String),
    Initialized,
}

/// Hand-off queue: callbacks become `Notification` values on a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<Notification>,
}

impl ChannelNotifier {
    fn push(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            log::debug!("Notification receiver dropped");
        }
    }
}

/// Create a notifier and the receiving end the UI layer drains
pub fn notification_channel() -> (Arc<ChannelNotifier>, Receiver<Notification>) {
    let (sender, receiver) = unbounded();
    (Arc::new(ChannelNotifier { sender }), receiver)
}

impl UiCallbacks for ChannelNotifier {
    fn on_message(&self, text: &str) {
        self.push(Notification::Message(text.to_string()));
    }

    fn on_error(&self, text: &str) {
        self.push(Notification::Error(text.to_string()));
    }

    fn on_state_changed(&self, text: &str) {
        self.push(Notification::StateChanged(text.to_string()));
    }

    fn on_initialized(&self) {
        self.push(Notification::Initialized);
    }
}

/// Writes every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl UiCallbacks for LogNotifier {
    fn on_message(&self, text: &str) {
        log::info!("[UI] {}", text);
    }

    fn on_error(&self, text: &str) {
        log::error!("[UI] Pipeline error: {}", text);
    }

    fn on_state_changed(&self, text: &str) {
        log::info!("[UI] {}", text);
    }

    fn on_initialized(&self) {
        log::info!("[UI] Pipeline initialized");
    }
}
