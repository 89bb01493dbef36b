use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// The chromosome list for an assembly was empty or malformed.
    #[error("invalid assembly data: {0}")]
    InvalidAssemblyData(String),

    #[error("unknown chromosome: {0}")]
    UnknownChromosome(String),

    /// Position text that could not be turned into one or two ranges.
    #[error("could not parse position `{text}`: {reason}")]
    ParseFailure { text: String, reason: String },
}

impl CoordError {
    pub(crate) fn parse(text: &str, reason: impl Into<String>) -> Self {
        CoordError::ParseFailure {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
