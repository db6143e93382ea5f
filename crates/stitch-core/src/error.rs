use thiserror::Error;

#[derive(Error, Debug)]
pub enum StitchError {
    #[error("Unknown image type for {title}: {encoding}")]
    UnsupportedEncoding { title: String, encoding: String },

    #[error("Dimension mismatch: {left:?} vs {right:?}")]
    DimensionMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("Empty extent: {0:?}")]
    EmptyExtent(Vec<usize>),

    #[error("No correlation peak with sufficient overlap")]
    NoValidPeak,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl StitchError {
    /// Whether the pair should be dropped as "no registration edge" rather
    /// than treated as a caller bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StitchError::UnsupportedEncoding { .. } | StitchError::NoValidPeak
        )
    }
}

impl From<toml::de::Error> for StitchError {
    fn from(err: toml::de::Error) -> Self {
        StitchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StitchError {
    fn from(err: toml::ser::Error) -> Self {
        StitchError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StitchError>;
