use std::fmt;

/// Provider lifecycle states
///
/// ```text
/// Uninitialized -> WarmedUp -> Executing -> CooledDown
///                                        -> Cancelled
///                                        -> EmergencyStopped
/// ```
///
/// Cancellation and emergency shutdown are also reachable from `WarmedUp`,
/// since the host may abort before dispatching any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    Uninitialized,
    WarmedUp,
    Executing,
    CooledDown,
    Cancelled,
    EmergencyStopped,
}

impl ProviderState {
    /// Returns true once the provider has shut down by any path
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CooledDown | Self::Cancelled | Self::EmergencyStopped
        )
    }

    /// Checks whether `self -> next` is a legal lifecycle move
    pub fn can_transition_to(&self, next: ProviderState) -> bool {
        use ProviderState::*;

        match (self, next) {
            (Uninitialized, WarmedUp) => true,
            // a terminal provider may be warmed up again for the next run
            (CooledDown | Cancelled | EmergencyStopped, WarmedUp) => true,
            (WarmedUp, Executing) => true,
            (Executing, CooledDown) => true,
            (WarmedUp | Executing, Cancelled | EmergencyStopped) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::WarmedUp => "warmed_up",
            Self::Executing => "executing",
            Self::CooledDown => "cooled_down",
            Self::Cancelled => "cancelled",
            Self::EmergencyStopped => "emergency_stopped",
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
