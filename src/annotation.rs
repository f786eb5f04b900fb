use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::any::type_name;

use crate::utils::thread_safety::{SendSafety, SyncSafety};

/// Leading dependency name that switches a callable to keyed arguments.
pub const KEYED_MARKER: &str = "{}";

/// Ordered dependency names of a callable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependencies {
    /// Each name is resolved strictly and passed as its own argument.
    Positional(Vec<String>),
    /// Names are resolved non-strictly and passed as one [`crate::KeyedArguments`] bundle.
    Keyed(Vec<String>),
}

impl Dependencies {
    /// Builds dependencies from a name list, a leading [`KEYED_MARKER`] selects [`Dependencies::Keyed`].
    #[must_use]
    pub fn parse<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = names.into_iter().map(Into::<String>::into).peekable();
        if names.peek().is_some_and(|name| name == KEYED_MARKER) {
            names.next();
            return Self::Keyed(names.collect());
        }
        Self::Positional(names.collect())
    }

    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Positional(names) | Self::Keyed(names) => names,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        matches!(self, Self::Keyed(_))
    }

    /// Number of arguments the callable receives.
    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Positional(names) => names.len(),
            Self::Keyed(_) => 1,
        }
    }
}

/// What an [`Annotator`] knows about a callable without declared dependencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallableInfo {
    pub type_name: &'static str,
    pub arity: usize,
}

/// Infers dependency names for callables that didn't declare them.
pub trait Annotator: SendSafety + SyncSafety {
    fn annotate(&self, callable: &CallableInfo) -> Option<Dependencies>;
}

/// Annotator backed by a table from function type names to dependencies.
///
/// Works for named functions, whose type names are unique.
/// All closures defined in one function share a type name prefix, so register them with [`crate::annotate`] instead.
#[derive(Clone, Debug, Default)]
pub struct StaticAnnotator {
    entries: BTreeMap<&'static str, Dependencies>,
}

impl StaticAnnotator {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    #[must_use]
    pub fn register<F, I, S>(mut self, _function: &F, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(type_name::<F>(), Dependencies::parse(names));
        self
    }
}

impl Annotator for StaticAnnotator {
    fn annotate(&self, callable: &CallableInfo) -> Option<Dependencies> {
        self.entries.get(callable.type_name).cloned()
    }
}
