use alloc::{string::String, vec::Vec};
use core::fmt::{self, Display, Formatter};

use super::resolve::ResolveErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum InitErrorKind {
    #[error("Failed to initialize! {initializer} failed: {}", Causes(.causes))]
    Failed {
        initializer: String,
        causes: Vec<ResolveErrorKind>,
    },
}

impl InitErrorKind {
    #[inline]
    #[must_use]
    pub(crate) fn failed(initializer: String, cause: ResolveErrorKind) -> Self {
        Self::Failed {
            initializer,
            causes: alloc::vec![cause],
        }
    }

    /// Point of failure, e.g. `service "foo"` or `initializer #1 (...)`.
    #[inline]
    #[must_use]
    pub fn initializer(&self) -> &str {
        match self {
            Self::Failed { initializer, .. } => initializer,
        }
    }

    #[inline]
    #[must_use]
    pub fn causes(&self) -> &[ResolveErrorKind] {
        match self {
            Self::Failed { causes, .. } => causes,
        }
    }

    /// Re-labels a failure of a private module's own sequence as seen from the enclosing injector.
    #[must_use]
    pub(crate) fn within_private(self) -> Self {
        match self {
            Self::Failed { initializer, causes } => Self::Failed {
                initializer: alloc::format!("private module {initializer}"),
                causes,
            },
        }
    }
}

struct Causes<'a>(&'a [ResolveErrorKind]);

impl Display for Causes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, cause) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}
