//! Anti-race sequencing for primary chunk loads.
//!
//! Responses can complete out of order when the user navigates quickly: a
//! request for chunk 2 may resolve after a later request for chunk 5. Every
//! primary load takes a [`SequenceToken`] before it is issued, and its response
//! is only applied to the view while that token is still current.

use std::fmt;

/// Identifies one primary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken(u64);

impl SequenceToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic counter that decides whether a response is still relevant.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    current: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter and return the new live token.
    pub fn next(&mut self) -> SequenceToken {
        self.current += 1;
        SequenceToken(self.current)
    }

    /// Whether `token` belongs to the most recent primary request.
    pub fn is_current(&self, token: SequenceToken) -> bool {
        token.0 == self.current
    }

    /// Abandon every outstanding token without issuing a new one.
    ///
    /// Used when the view changes without a network request (cache hit) and
    /// when a session is torn down.
    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    pub fn current(&self) -> u64 {
        self.current
    }
}
