use alloc::string::String;

/// Error of a provider body.
///
/// Factories and constructors return it directly, so `?` works on anything convertible into [`anyhow::Error`].
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument \"{name}\" is missing")]
    MissingArgument { name: String },
    #[error("Argument \"{name}\" has incorrect type. Actual: {actual}, expected: {expected}")]
    IncorrectType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
