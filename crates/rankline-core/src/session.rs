use crate::remote::ScoreFields;

/// Best score tuple.
///
/// Ordering is lexicographic on `(result, minor_result)`; `level` rides
/// along with whichever tuple wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BestScore {
    pub result: u32,
    pub minor_result: u32,
    pub level: u32,
}

impl BestScore {
    pub fn new(result: u32, minor_result: u32, level: u32) -> Self {
        Self {
            result,
            minor_result,
            level,
        }
    }

    /// Strictly better than `other`; ties are not an improvement
    pub fn improves_on(&self, other: &BestScore) -> bool {
        self.result > other.result
            || (self.result == other.result && self.minor_result > other.minor_result)
    }

    pub fn to_fields(self, mode: u32) -> ScoreFields {
        ScoreFields {
            result: self.result,
            mode,
            level: self.level,
            minor_result: self.minor_result,
        }
    }
}

impl From<ScoreFields> for BestScore {
    fn from(fields: ScoreFields) -> Self {
        Self {
            result: fields.result,
            minor_result: fields.minor_result,
            level: fields.level,
        }
    }
}

/// Locally known state of one leaderboard session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub initialized: bool,
    pub available: bool,
    pub best: BestScore,
    pub rank: u32,
    pub login: String,
}

impl Session {
    /// Both lifecycle stages reached, submissions allowed
    pub fn is_ready(&self) -> bool {
        self.initialized && self.available
    }

    /// Drop lifecycle flags after teardown; cached scores and login stay
    pub fn reset_lifecycle(&mut self) {
        self.initialized = false;
        self.available = false;
    }

    /// Human-readable lifecycle stage, for log lines
    pub fn stage(&self) -> &'static str {
        match (self.initialized, self.available) {
            (false, _) => "not initialized",
            (true, false) => "initialized, unavailable",
            (true, true) => "available",
        }
    }
}

/// Read-only copy of the session, taken under the tracker lock
pub type SessionSnapshot = Session;
