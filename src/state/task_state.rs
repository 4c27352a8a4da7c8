/// Qualification task state definitions
use std::fmt;

/// Represents the current state of one qualification task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualificationState {
    // ===== Active States =====
    /// Link accepted by the pool but not yet started
    Pending,

    /// Qualification page is being fetched
    FetchingPage,

    /// Title and info table are being extracted
    ParsingHeader,

    /// Module levels are being grouped and their modules resolved
    ExpandingModuleLevels,

    // ===== Terminal States =====
    /// Qualification fully assembled
    Assembled,

    /// Page unusable (fetch failure or missing structure)
    Failed,
}

impl QualificationState {
    /// Returns true if no further processing happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Assembled | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Assembled)
    }

    /// Returns true if moving from this state to `next` is legal
    ///
    /// Active states advance one step at a time and may fail at any point.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (state, Self::Failed) => !state.is_terminal(),
            (Self::Pending, Self::FetchingPage)
            | (Self::FetchingPage, Self::ParsingHeader)
            | (Self::ParsingHeader, Self::ExpandingModuleLevels)
            | (Self::ExpandingModuleLevels, Self::Assembled) => true,
            _ => false,
        }
    }

    /// Short machine-friendly name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingPage => "fetching_page",
            Self::ParsingHeader => "parsing_header",
            Self::ExpandingModuleLevels => "expanding_module_levels",
            Self::Assembled => "assembled",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible states in lifecycle order
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::FetchingPage,
            Self::ParsingHeader,
            Self::ExpandingModuleLevels,
            Self::Assembled,
            Self::Failed,
        ]
    }
}

impl fmt::Display for QualificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
