use alloc::string::String;

#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("No provider for \"{name}\". Cannot use provider from the parent!")]
    NoProviderForForcedScope { name: String },
}
