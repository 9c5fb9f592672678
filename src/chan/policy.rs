/// Boards that are refused unless the config file replaces the list.
pub(crate) const DEFAULT_DENIED_BOARDS: &[&str] = &[
    "s", "hc", "hm", "h", "e", "u", "d", "y", "t", "hr", "gif", "aco", "r",
];

/// Message printed when a board is refused.
pub(crate) const REFUSAL_MESSAGE: &str = "Stop being a degenerate.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoardVerdict {
    Allowed,
    Refused,
}

/// Content filter applied to the board code before any work starts.
#[derive(Debug, Clone)]
pub(crate) struct BoardPolicy {
    denied: Vec<String>,
}

impl BoardPolicy {
    pub(crate) fn new<I, S>(denied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied: denied.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn check(&self, board: &str) -> BoardVerdict {
        if self.denied.iter().any(|denied| denied == board) {
            BoardVerdict::Refused
        } else {
            BoardVerdict::Allowed
        }
    }
}
