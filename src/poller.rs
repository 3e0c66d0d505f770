//! Periodic error polling
//!
//! The UI side of the error slot: a named background thread that calls a
//! poll function on a fixed interval and forwards anything it returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Background poller, stopped on [`ErrorPoller::stop`] or drop
pub struct ErrorPoller {
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ErrorPoller {
    pub fn spawn<P, E>(interval: Duration, poll: P, on_error: E) -> std::io::Result<Self>
    where
        P: Fn() -> Option<String> + Send + 'static,
        E: Fn(String) + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        // Short sleeps so stop() never waits a full interval
        let tick = interval.min(Duration::from_millis(50));

        let thread = std::thread::Builder::new()
            .name("pipeliner-error-poll".into())
            .spawn(move || {
                log::debug!("Error poller started ({:?} interval)", interval);
                let mut elapsed = Duration::ZERO;
                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(tick);
                    elapsed += tick;
                    if elapsed < interval {
                        continue;
                    }
                    elapsed = Duration::ZERO;

                    if let Some(error) = poll() {
                        if !error.is_empty() {
                            on_error(error);
                        }
                    }
                }
                log::debug!("Error poller stopped");
            })?;

        Ok(Self {
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Stop and join the poll thread. Returns false if it had panicked.
    pub fn stop(&mut self) -> bool {
        self.stop_flag.store(true, Ordering::Relaxed);
        let Some(handle) = self.thread.take() else {
            return true;
        };
        if handle.join().is_err() {
            log::error!("Error poller thread panicked");
            return false;
        }
        true
    }
}

impl Drop for ErrorPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;

    #[test]
    fn forwards_non_empty_errors_once() {
        let queue = Arc::new(Mutex::new(vec![
            Some("first".to_string()),
            Some(String::new()),
            None,
            Some("second".to_string()),
        ]));
        let source = queue.clone();
        let (tx, rx) = unbounded();

        let mut poller = ErrorPoller::spawn(
            Duration::from_millis(5),
            move || {
                let mut q = source.lock();
                if q.is_empty() {
                    None
                } else {
                    q.remove(0)
                }
            },
            move |e| {
                let _ = tx.send(e);
            },
        )
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "first");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "second");
        assert!(poller.stop());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn panicking_poll_is_reported_on_stop() {
        let mut poller = ErrorPoller::spawn(
            Duration::from_millis(1),
            || panic!("poll failed"),
            |_| {},
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!poller.stop());
        // Already joined
        assert!(poller.stop());
    }

    #[test]
    fn drop_stops_the_thread() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let poller = ErrorPoller::spawn(
            Duration::from_millis(1),
            move || {
                *counter.lock() += 1;
                None
            },
            |_| {},
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        drop(poller);

        let after_drop = *calls.lock();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(*calls.lock(), after_drop);
    }
}
