//! Command/response protocol between the controller and the camera worker.
//!
//! The worker owns its device behind two bounded queues and two manual-reset
//! signals. The controller pushes a [`Command`], sets the command signal, then
//! waits on the response signal and pops exactly one [`Response`]. The worker
//! mirrors this on its side. Every command produces exactly one response, and
//! responses are delivered in submission order.
//!
//! ## Signal discipline
//!
//! Both signals are manual-reset: once set they stay set until explicitly
//! cleared. A consumer must clear the signal immediately after its wait
//! returns and before draining the queue. Clearing after the drain loses
//! wakeups when a producer sets the signal between the drain and the clear.

use crate::config::WorkerSettings;
use crate::error::ChannelError;
use crate::hardware::Frame;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Commands accepted by the camera worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Capture and return a single frame.
    Snap,
    /// Begin recording frames to a video file.
    StartRecording,
    /// Finalize the current recording, if any.
    StopRecording,
    /// Change the device exposure time in milliseconds.
    SetExposure(u32),
    /// Push the controller's measured frame rate to the worker.
    SetFps(u32),
    /// Ask for the frame rate last communicated via `SetFps`.
    QueryFps,
    /// Shut the worker down gracefully.
    Stop,
}

/// Responses produced by the camera worker, exactly one per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Device opened; the worker is accepting commands.
    Ready,
    /// The command could not be serviced in the current state.
    NotReady(String),
    /// A captured frame, answering `Snap`.
    Frame(Frame),
    /// Terminal response: the worker has released its device and is exiting.
    Stopped,
    /// Exposure accepted; carries the value now in effect.
    ExposureAck(u32),
    /// Exposure rejected; device state is unchanged.
    ExposureRejected,
    /// Frame rate answering `QueryFps` or acknowledging `SetFps`.
    FpsValue(u32),
    /// The worker entered the faulted state and will service no more commands.
    Fault(String),
}

impl Response {
    /// Short variant name for logging without dumping pixel payloads.
    pub fn label(&self) -> &'static str {
        match self {
            Response::Ready => "Ready",
            Response::NotReady(_) => "NotReady",
            Response::Frame(_) => "Frame",
            Response::Stopped => "Stopped",
            Response::ExposureAck(_) => "ExposureAck",
            Response::ExposureRejected => "ExposureRejected",
            Response::FpsValue(_) => "FpsValue",
            Response::Fault(_) => "Fault",
        }
    }
}

/// Manual-reset signal built on a mutex-guarded flag and a condvar.
///
/// `set` wakes all waiters and leaves the flag raised until `clear`. This is
/// the handshake primitive for both directions of the worker protocol.
#[derive(Default)]
pub struct Signal {
    flag: Mutex<bool>,
    cvar: Condvar,
}

impl Signal {
    /// Create a signal in the cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake all current waiters.
    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *flag = true;
        self.cvar.notify_all();
    }

    /// Lower the signal. Future waits block until the next `set`.
    pub fn clear(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *flag = false;
    }

    /// Whether the signal is currently raised.
    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the signal is raised or the timeout elapses.
    ///
    /// Returns `true` when the signal was observed raised. The flag is NOT
    /// cleared; the caller clears it before draining the paired queue.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*flag {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .cvar
                .wait_timeout(flag, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            flag = guard;
            if result.timed_out() && !*flag {
                return false;
            }
        }
        true
    }
}

/// Bounded FIFO queue shared between the controller and the worker.
///
/// Capacity is enforced on push; a full queue is a protocol violation by the
/// producer, reported as [`ChannelError::Full`] rather than blocking.
pub struct MessageQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> MessageQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an item.
    ///
    /// # Errors
    /// Returns `ChannelError::Full` when the queue is at capacity; the item is
    /// dropped rather than enqueued.
    pub fn push(&self, item: T) -> Result<(), ChannelError> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            return Err(ChannelError::Full);
        }
        queue.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item.
    ///
    /// # Errors
    /// Returns `ChannelError::Empty` when there is nothing queued.
    pub fn pop(&self) -> Result<T, ChannelError> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.pop_front().ok_or(ChannelError::Empty)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all queued items.
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Maximum number of items the queue will hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Shared endpoints of one worker's protocol.
///
/// Cloned via `Arc` into the worker thread at spawn time; the controller keeps
/// the other reference.
pub struct WorkerChannels {
    /// Controller-to-worker command queue.
    pub commands: MessageQueue<Command>,
    /// Raised by the controller after each command push.
    pub command_ready: Signal,
    /// Worker-to-controller response queue.
    pub responses: MessageQueue<Response>,
    /// Raised by the worker after each response push.
    pub response_ready: Signal,
}

impl WorkerChannels {
    /// Create channels with the configured queue capacities.
    pub fn new(settings: &WorkerSettings) -> Arc<Self> {
        Arc::new(Self {
            commands: MessageQueue::new(settings.command_queue_capacity),
            command_ready: Signal::new(),
            responses: MessageQueue::new(settings.response_queue_capacity),
            response_ready: Signal::new(),
        })
    }

    /// Push a command and raise the command signal in one step.
    ///
    /// # Errors
    /// Returns `ChannelError::Full` when the command queue is at capacity; the
    /// signal is left untouched in that case.
    pub fn send_command(&self, command: Command) -> Result<(), ChannelError> {
        self.commands.push(command)?;
        self.command_ready.set();
        Ok(())
    }

    /// Push a response and raise the response signal in one step.
    ///
    /// # Errors
    /// Returns `ChannelError::Full` when the response queue is at capacity.
    pub fn send_response(&self, response: Response) -> Result<(), ChannelError> {
        self.responses.push(response)?;
        self.response_ready.set();
        Ok(())
    }
}
