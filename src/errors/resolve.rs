use alloc::string::String;
use core::fmt::{self, Display, Formatter};

use super::instantiate::InstantiateErrorKind;
use crate::resolution::ResolutionPath;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No provider for \"{name}\"!{}", resolving(.path))]
    NoProvider { name: String, path: ResolutionPath },
    #[error("Cannot resolve circular dependency!{}", resolving(.path))]
    CircularDependency { path: ResolutionPath },
    #[error("Cannot resolve property \"{property}\" of \"{name}\"!{}", resolving(.path))]
    NoProperty {
        name: String,
        property: String,
        path: ResolutionPath,
    },
    #[error("Cannot invoke `{callable}`. Expected a callable with declared dependencies!")]
    InvalidCallable { callable: &'static str },
    #[error("Incorrect type of \"{name}\". Actual: {actual}, expected: {expected}")]
    IncorrectType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Failed to instantiate!{}: {source}", resolving(.path))]
    Instantiate {
        path: ResolutionPath,
        #[source]
        source: InstantiateErrorKind,
    },
}

impl ResolveErrorKind {
    /// Root-to-failure path of the resolution, empty for errors raised outside of it.
    #[must_use]
    pub fn path(&self) -> Option<&ResolutionPath> {
        match self {
            Self::NoProvider { path, .. }
            | Self::CircularDependency { path }
            | Self::NoProperty { path, .. }
            | Self::Instantiate { path, .. } => Some(path),
            Self::InvalidCallable { .. } | Self::IncorrectType { .. } => None,
        }
    }
}

struct Resolving<'a>(&'a ResolutionPath);

fn resolving(path: &ResolutionPath) -> Resolving<'_> {
    Resolving(path)
}

impl Display for Resolving<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " (Resolving: {})", self.0)
    }
}
