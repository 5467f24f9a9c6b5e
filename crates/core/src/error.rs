/// Domain errors raised while turning client input into an execution request.
///
/// Only validation can fail here; everything else in the request pipeline is
/// either total (coercion) or reported as an execution outcome.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Human-readable message without the variant prefix, suitable for
    /// returning to API clients.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg) => msg,
        }
    }
}
