//! The store's task queue.
//!
//! Work that the store defers to "later in the turn" (flushing coalesced
//! fetches and saves, syncing live record arrays, running adapter requests)
//! is queued here and drained by [`Store::flush`](crate::Store::flush).

use std::collections::{HashSet, VecDeque};

use crate::fetch::StoreRequest;

/// Store-wide flushes. At most one of each kind is queued at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flush {
    Fetches,
    Saves,
    RecordArrays,
}

#[derive(Debug)]
pub enum Task {
    Flush(Flush),
    Request(StoreRequest),
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
    queued: HashSet<Flush>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Queue `flush` unless it is already waiting. Returns whether it was queued.
    pub fn schedule_flush(&mut self, flush: Flush) -> bool {
        if !self.queued.insert(flush) {
            return false;
        }
        self.queue.push_back(Task::Flush(flush));
        true
    }

    pub fn schedule(&mut self, request: StoreRequest) {
        self.queue.push_back(Task::Request(request));
    }

    pub fn next(&mut self) -> Option<Task> {
        let task = self.queue.pop_front()?;
        if let Task::Flush(flush) = &task {
            self.queued.remove(flush);
        }
        Some(task)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove every queued task, returning the requests so their waiters can
    /// be settled.
    pub fn drain_requests(&mut self) -> Vec<StoreRequest> {
        self.queued.clear();
        self.queue
            .drain(..)
            .filter_map(|task| match task {
                Task::Request(request) => Some(request),
                Task::Flush(_) => None,
            })
            .collect()
    }
}
