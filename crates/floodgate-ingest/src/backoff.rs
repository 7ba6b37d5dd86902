// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Exponential reconnect backoff with a give-up horizon.

use std::time::{Duration, Instant};

/// Total time a reconnect loop keeps retrying before the policy reports
/// exhaustion.
const MAX_ELAPSED: Duration = Duration::from_secs(15 * 60);

/// Capped exponential retry delays: `initial, 2·initial, 4·initial, …`
/// up to `max`.
///
/// [`Backoff::reset`] restores the initial state after a successful
/// connection. Once [`MAX_ELAPSED`] has passed without a reset,
/// [`Backoff::next_delay`] returns `None` and the caller gives up.
#[derive(Debug)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    max_elapsed: Duration,
    next: Duration,
    started: Option<Instant>,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            max_elapsed: MAX_ELAPSED,
            next: initial,
            started: None,
        }
    }

    /// Returns the delay to wait before the next attempt, or `None` once
    /// the policy is exhausted.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        let started = *self.started.get_or_insert_with(Instant::now);
        if started.elapsed() > self.max_elapsed {
            return None;
        }
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        Some(delay)
    }

    /// Restores the initial delay and give-up horizon.
    pub(crate) fn reset(&mut self) {
        self.next = self.initial;
        self.started = None;
    }

    #[cfg(test)]
    fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn exhausts_after_max_elapsed() {
        let mut backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(4))
            .with_max_elapsed(Duration::from_millis(2));

        // The clock starts on the first call, so that one still yields.
        assert!(backoff.next_delay().is_some());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), None);

        // A reset restarts the horizon.
        backoff.reset();
        assert!(backoff.next_delay().is_some());
    }
}
