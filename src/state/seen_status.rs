/// Seen-URL status definitions
///
/// Every URL the scheduler has decided on lands in the ledger with one of
/// these statuses. Either status means "never fetch again in this run".
use std::fmt;

/// Outcome recorded for a URL in the seen-URL ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeenStatus {
    /// Passed the filter, fetched and handed to the index
    Accepted,

    /// Turned away by the filter, or its fetch failed for good
    Rejected,
}

impl SeenStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for SeenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
