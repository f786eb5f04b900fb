use alloc::{string::String, vec::Vec};
use core::fmt::{self, Debug, Formatter};

use crate::{
    callable::Callable,
    config::Config,
    instance::Instance,
    registry::ProviderEntry,
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
};

/// Step run by [`crate::Injector::init`].
#[derive(Clone, Debug)]
pub(crate) enum Initializer {
    /// Eagerly resolves the service.
    Service(String),
    /// Invokes the callable with injection.
    Callable(Callable),
}

impl Initializer {
    #[must_use]
    pub(crate) fn annotated(self, config: &Config) -> Self {
        match self {
            Self::Callable(callable) => Self::Callable(callable.annotated(config.annotator())),
            service => service,
        }
    }
}

#[derive(Default)]
pub(crate) struct ModuleInner {
    pub(crate) providers: Vec<(String, ProviderEntry)>,
    pub(crate) initializers: Vec<Initializer>,
    pub(crate) depends: Vec<Module>,
    pub(crate) nested: Vec<Module>,
    pub(crate) exports: Option<Vec<String>>,
}

/// Declarations of named providers.
///
/// A module is a shared handle: clones are the same module,
/// so one reachable through several `depends` paths is loaded once per injector.
#[derive(Clone)]
pub struct Module {
    pub(crate) inner: RcThreadSafety<ModuleInner>,
}

impl Module {
    #[inline]
    #[must_use]
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_providers(providers: Vec<(String, ProviderEntry)>) -> Self {
        Self {
            inner: RcThreadSafety::new(ModuleInner {
                providers,
                ..ModuleInner::default()
            }),
        }
    }

    /// Same declarations without initializers, dependencies, nested modules or exports.
    #[must_use]
    pub(crate) fn internals(&self) -> Self {
        Self::from_providers(self.inner.providers.clone())
    }

    /// Declared names in declaration order, duplicates included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.providers.iter().map(|(name, _)| name.as_str())
    }

    #[inline]
    #[must_use]
    pub fn exports(&self) -> Option<&[String]> {
        self.inner.exports.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.inner.exports.is_some()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Module) -> bool {
        RcThreadSafety::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("providers", &self.names().collect::<Vec<_>>())
            .field("initializers", &self.inner.initializers.len())
            .field("depends", &self.inner.depends.len())
            .field("nested", &self.inner.nested.len())
            .field("exports", &self.inner.exports)
            .finish()
    }
}

#[derive(Default)]
pub struct ModuleBuilder {
    inner: ModuleInner,
}

impl ModuleBuilder {
    /// Declares a ready value, returned as is on every resolution.
    #[must_use]
    pub fn value<T: SendSafety + SyncSafety + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.inner
            .providers
            .push((name.into(), ProviderEntry::Value(Instance::new(value))));
        self
    }

    /// Declares a factory, called once per injector with its dependencies resolved.
    #[must_use]
    pub fn factory(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.inner.providers.push((name.into(), ProviderEntry::Factory(callable)));
        self
    }

    /// Declares a constructor.
    ///
    /// Its result becomes the service, unless it returns an existing [`Instance`] which is used instead.
    #[must_use]
    pub fn constructor(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.inner.providers.push((name.into(), ProviderEntry::Constructor(callable)));
        self
    }

    /// Adds a callable invoked with injection by [`crate::Injector::init`].
    #[must_use]
    pub fn init(mut self, callable: Callable) -> Self {
        self.inner.initializers.push(Initializer::Callable(callable));
        self
    }

    /// Adds a service eagerly resolved by [`crate::Injector::init`].
    #[must_use]
    pub fn init_service(mut self, name: impl Into<String>) -> Self {
        self.inner.initializers.push(Initializer::Service(name.into()));
        self
    }

    /// Loads `module` and its initializers before this one.
    #[must_use]
    pub fn depends(mut self, module: &Module) -> Self {
        self.inner.depends.push(module.clone());
        self
    }

    /// Adds a module loaded into the private injector, visible only to this module's declarations.
    /// Has no effect without [`Self::exports`].
    #[must_use]
    pub fn nested(mut self, module: &Module) -> Self {
        self.inner.nested.push(module.clone());
        self
    }

    /// Makes the module private, only the listed names are reachable from outside.
    #[must_use]
    pub fn exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .exports
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::<String>::into));
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> Module {
        Module {
            inner: RcThreadSafety::new(self.inner),
        }
    }
}
