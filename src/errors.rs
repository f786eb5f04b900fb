mod init;
mod instantiate;
mod resolve;
mod scope;

pub use init::InitErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use scope::ScopeErrorKind;
