//! Generation-tagged refresh scheduling
//!
//! Every activation of a page (entering it, or refreshing it) mints a new
//! generation. Asynchronous work records the [`Activation`] it was issued
//! under and its result is applied only while that activation is still live.
//! Stale timers and fetches are not cancelled; they simply become inert.

use std::time::Duration;

use super::page::Page;

/// Monotonic activation counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Identity of one page activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Activation {
    pub page: Page,
    pub generation: Generation,
}

#[derive(Debug)]
pub struct PollScheduler {
    next: u64,
    current: Activation,
    interval: Duration,
}

impl PollScheduler {
    #[must_use]
    pub fn new(first: Page, interval: Duration) -> Self {
        Self {
            next: 1,
            current: Activation {
                page: first,
                generation: Generation(0),
            },
            interval,
        }
    }

    /// Make `page` current under a fresh generation
    pub fn activate(&mut self, page: Page) -> Activation {
        self.current = Activation {
            page,
            generation: Generation(self.next),
        };
        self.next += 1;
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Activation {
        self.current
    }

    /// The apply-if-current guard shared by every asynchronous result
    #[must_use]
    pub fn is_current(&self, activation: Activation) -> bool {
        activation == self.current
    }

    /// Delay for the next refresh of the current page, if it reloads at all
    #[must_use]
    pub fn next_refresh(&self, live_stream: bool) -> Option<(Activation, Duration)> {
        let spec = self.current.page.spec();
        (spec.does_reload && !live_stream).then_some((self.current, self.interval))
    }
}
