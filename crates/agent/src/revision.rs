use crate::prompts::{REVISED_MARKER, VALID_MARKER};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevisionVerdict {
    Valid,
    Revised(String),
    /// Neither marker was present; the revisor's reply is passed through.
    Unrecognized(String),
}

pub fn parse_verdict(output: &str) -> RevisionVerdict {
    if output.contains(VALID_MARKER) {
        return RevisionVerdict::Valid;
    }
    match output.split_once(REVISED_MARKER) {
        Some((_, revised)) => RevisionVerdict::Revised(revised.trim().to_string()),
        None => RevisionVerdict::Unrecognized(output.to_string()),
    }
}

impl RevisionVerdict {
    /// Text to return to the user for `original`.
    pub fn resolve(self, original: &str) -> String {
        match self {
            Self::Valid => original.to_string(),
            Self::Revised(text) | Self::Unrecognized(text) => text,
        }
    }
}
