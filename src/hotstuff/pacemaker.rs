/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The pacemaker: the per-view deadline that forces view progression when a leader stalls.
//!
//! The driver blocks on its inbound channel for at most [`remaining`](Pacemaker::remaining)
//! and treats the elapse as a view timeout. This timeout is independent of any network
//! deadline; it is the consensus layer's own notion of "this view is going nowhere".

use std::time::{Duration, Instant};

pub(crate) struct Pacemaker {
    view_timeout: Duration,
    deadline: Instant,
}

impl Pacemaker {
    pub(crate) fn new(view_timeout: Duration) -> Pacemaker {
        Pacemaker {
            view_timeout,
            deadline: Instant::now() + view_timeout,
        }
    }

    /// Re-arm the deadline. Called on every view entry.
    pub(crate) fn restart(&mut self) {
        self.deadline = Instant::now() + self.view_timeout;
    }

    /// Time left in the current view. Zero once the deadline has passed.
    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
