// Single-slot error mailbox between the worker and control threads

use parking_lot::Mutex;

/// Holds at most one unread error message.
///
/// A newer error overwrites an older unread one; reading clears the slot.
#[derive(Debug, Default)]
pub struct ErrorChannel {
    slot: Mutex<Option<String>>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message`, replacing any unread one.
    ///
    /// Returns true if an unread message was overwritten.
    pub fn publish(&self, message: impl Into<String>) -> bool {
        let previous = self.slot.lock().replace(message.into());
        if let Some(ref lost) = previous {
            log::debug!("Overwriting unread error: {}", lost);
        }
        previous.is_some()
    }

    /// Atomically read and clear the pending message
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }

    /// Drop any pending message without reading it
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_consumes_once() {
        let errors = ErrorChannel::new();
        assert!(!errors.publish("first"));
        assert_eq!(errors.take().as_deref(), Some("first"));
        assert_eq!(errors.take(), None);
    }

    #[test]
    fn newer_error_overwrites_unread_one() {
        let errors = ErrorChannel::new();
        errors.publish("old");
        assert!(errors.publish("new"));
        assert_eq!(errors.take().as_deref(), Some("new"));
        assert!(!errors.has_pending());
    }

    #[test]
    fn concurrent_writers_leave_exactly_one_message() {
        let errors = Arc::new(ErrorChannel::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let errors = errors.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        errors.publish(format!("writer {} error {}", i, n));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let last = errors.take().unwrap();
        assert!(last.ends_with("error 99"));
        assert_eq!(errors.take(), None);
    }
}
