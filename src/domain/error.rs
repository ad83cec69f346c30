use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential field `{path}` is missing")]
    MissingField { path: &'static str },
    #[error("credential field `{path}` has the wrong shape: expected {expected}")]
    WrongShape {
        path: &'static str,
        expected: &'static str,
    },
}

impl CredentialError {
    pub fn missing(path: &'static str) -> Self {
        Self::MissingField { path }
    }

    pub fn wrong_shape(path: &'static str, expected: &'static str) -> Self {
        Self::WrongShape { path, expected }
    }
}
