//! Debounced search input.
//!
//! Keystrokes land in a draft immediately; the synchronized search term
//! only updates once typing goes quiet, so intermediate prefixes never
//! reach the address or trigger fetches.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    draft: String,
    last_keystroke: Option<Instant>,
}

impl SearchDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            draft: String::new(),
            last_keystroke: None,
        }
    }

    /// Seed the draft without arming the timer, e.g. when restoring a view
    /// whose search term came in from a link.
    pub fn seed(&mut self, term: impl Into<String>) {
        self.draft = term.into();
        self.last_keystroke = None;
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Record a keystroke, restarting the quiet period.
    pub fn type_term(&mut self, term: impl Into<String>) {
        self.draft = term.into();
        self.last_keystroke = Some(Instant::now());
    }

    /// Time left before the draft fires, for a status-line countdown.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.last_keystroke
            .map(|last| self.delay.saturating_sub(last.elapsed()))
    }

    /// Yield the draft once the quiet period has passed. Polled each tick;
    /// returns at most once per armed draft.
    pub fn take_ready(&mut self) -> Option<String> {
        let last = self.last_keystroke?;
        if last.elapsed() < self.delay {
            return None;
        }
        self.last_keystroke = None;
        Some(self.draft.clone())
    }

    /// Drop the pending draft, putting the given committed term back.
    pub fn cancel(&mut self, committed: impl Into<String>) {
        self.draft = committed.into();
        self.last_keystroke = None;
    }
}
