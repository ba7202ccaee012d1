use std::collections::VecDeque;
use std::sync::Mutex;

use crate::lock;

/// FIFO delivery queue shared by the store and the in-process channel.
///
/// Whoever enqueues into an idle queue becomes the drainer and delivers
/// every message, including ones enqueued by the handlers it calls. Any
/// other `enqueue` just appends. Delivery is therefore never nested and
/// never reordered.
pub(crate) struct DeliveryQueue<M> {
    state: Mutex<QueueState<M>>,
}

struct QueueState<M> {
    pending: VecDeque<M>,
    draining: bool,
}

impl<M> DeliveryQueue<M> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    /// Append a message. Returns `true` if the caller must now `drain`.
    pub(crate) fn enqueue(&self, message: M) -> bool {
        let mut state = lock(&self.state);
        state.pending.push_back(message);
        if state.draining {
            false
        } else {
            state.draining = true;
            true
        }
    }

    /// Deliver until the queue is empty. No lock is held while `deliver` runs.
    pub(crate) fn drain(&self, mut deliver: impl FnMut(M)) {
        let mut guard = DrainGuard {
            queue: self,
            armed: true,
        };
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.pending.pop_front() {
                    Some(message) => message,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            deliver(next);
        }
        guard.armed = false;
    }
}

/// Releases the drainer role if a handler panics mid-delivery.
struct DrainGuard<'a, M> {
    queue: &'a DeliveryQueue<M>,
    armed: bool,
}

impl<M> Drop for DrainGuard<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.queue.state).draining = false;
        }
    }
}
