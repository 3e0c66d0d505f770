//! Worker event loop
//!
//! A single-threaded cooperative loop built on a crossbeam channel. Bus
//! messages from the engine, commands from the control thread and the quit
//! signal all arrive on the same queue, so they are processed strictly in
//! arrival order on the worker thread.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::engine::{BusMessage, PlaybackState};

/// Request executed on the worker thread on behalf of another thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Request a pipeline state transition
    SetState(PlaybackState),
    /// Re-run the readiness check from inside the running loop
    CheckReady,
}

/// Everything the loop can be woken up by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Bus(BusMessage),
    Command(LoopCommand),
    Quit,
}

/// Receiving side of the loop, moved into the worker thread
pub struct LoopContext {
    sender: Sender<LoopEvent>,
    receiver: Receiver<LoopEvent>,
}

/// Cloneable handle used to post into (or quit) a loop from any thread
#[derive(Clone, Debug)]
pub struct LoopHandle {
    sender: Sender<LoopEvent>,
}

/// Sender the engine uses to deliver bus messages into the loop
#[derive(Clone, Debug)]
pub struct BusSender {
    sender: Sender<LoopEvent>,
}

impl LoopContext {
    /// Create a loop context together with a handle able to quit it.
    ///
    /// The handle is usable before the loop runs: a quit posted early is
    /// picked up as soon as the worker enters the loop.
    pub fn new() -> (Self, LoopHandle) {
        let (sender, receiver) = unbounded();
        let handle = LoopHandle {
            sender: sender.clone(),
        };
        (Self { sender, receiver }, handle)
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn bus_sender(&self) -> BusSender {
        BusSender {
            sender: self.sender.clone(),
        }
    }

    /// Block dispatching events until a quit signal arrives.
    ///
    /// Returns the number of events dispatched.
    pub fn run<F>(&self, mut dispatch: F) -> u64
    where
        F: FnMut(LoopEvent),
    {
        let mut dispatched = 0u64;
        loop {
            match self.receiver.recv() {
                Ok(LoopEvent::Quit) => break,
                Ok(event) => {
                    dispatch(event);
                    dispatched += 1;
                }
                // Unreachable while `self` holds a sender
                Err(_) => break,
            }
        }
        dispatched
    }

    /// Number of events still queued (discarded when the context drops)
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl LoopHandle {
    /// Signal the loop to exit after the current dispatch
    pub fn quit(&self) {
        if self.sender.send(LoopEvent::Quit).is_err() {
            log::debug!("Event loop already gone, quit ignored");
        }
    }

    /// Post a command; returns false if the loop no longer exists
    pub fn post(&self, command: LoopCommand) -> bool {
        self.sender.send(LoopEvent::Command(command)).is_ok()
    }
}

impl BusSender {
    /// Post a bus message; returns false if the loop no longer exists
    pub fn post(&self, message: BusMessage) -> bool {
        self.sender.send(LoopEvent::Bus(message)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_quit_is_honoured_when_loop_starts() {
        let (ctx, handle) = LoopContext::new();
        handle.post(LoopCommand::CheckReady);
        handle.quit();
        handle.post(LoopCommand::SetState(PlaybackState::Playing));

        let mut seen = Vec::new();
        let dispatched = ctx.run(|event| seen.push(event));

        assert_eq!(dispatched, 1);
        assert_eq!(seen, vec![LoopEvent::Command(LoopCommand::CheckReady)]);
        assert_eq!(ctx.pending(), 1);
    }

    #[test]
    fn posting_after_context_drop_reports_failure() {
        let (ctx, handle) = LoopContext::new();
        let bus = ctx.bus_sender();
        drop(ctx);
        // Sending fails once the receiver is gone, even with senders alive
        assert!(!handle.post(LoopCommand::CheckReady));
        assert!(!bus.post(BusMessage::Error {
            source: "src".into(),
            message: "gone".into(),
            debug: None,
        }));
    }
}
