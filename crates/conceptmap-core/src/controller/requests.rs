//! Request tokens for asynchronous service calls
//!
//! Each slot keeps a generation counter. Issuing a request or superseding
//! the slot bumps it; a response is only applied if its token still
//! carries the latest generation.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Logical channel whose latest request wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSlot {
    Analysis,
    Quiz,
    Assessment,
}

impl RequestSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Quiz => "quiz",
            Self::Assessment => "assessment",
        }
    }

    pub fn all() -> &'static [RequestSlot] {
        &[Self::Analysis, Self::Quiz, Self::Assessment]
    }

    fn index(&self) -> usize {
        match self {
            Self::Analysis => 0,
            Self::Quiz => 1,
            Self::Assessment => 2,
        }
    }
}

impl std::fmt::Display for RequestSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestToken {
    pub slot: RequestSlot,
    pub generation: u64,
}

/// What happened to a resolved response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The response was current and its effect was applied
    Applied,
    /// A newer request superseded it; nothing changed
    Discarded,
}

impl Resolution {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-slot generation counters
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    generations: [u64; 3],
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token that supersedes every earlier one for `slot`
    pub fn issue(&mut self, slot: RequestSlot) -> RequestToken {
        let generation = self.bump(slot);
        debug!(slot = %slot, generation, "Request issued");
        RequestToken { slot, generation }
    }

    /// Invalidate outstanding tokens for `slot` without issuing a new one
    pub fn supersede(&mut self, slot: RequestSlot) {
        self.bump(slot);
    }

    pub fn latest(&self, slot: RequestSlot) -> u64 {
        self.generations[slot.index()]
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.latest(token.slot) == token.generation
    }

    /// `Err(StaleResponse)` unless the token is the latest for its slot
    pub fn check(&self, token: &RequestToken) -> Result<()> {
        if self.is_current(token) {
            Ok(())
        } else {
            Err(Error::StaleResponse {
                slot: token.slot.as_str(),
                token: token.generation,
                latest: self.latest(token.slot),
            })
        }
    }

    fn bump(&mut self, slot: RequestSlot) -> u64 {
        let generation = &mut self.generations[slot.index()];
        *generation += 1;
        *generation
    }
}
