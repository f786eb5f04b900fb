use alloc::{collections::BTreeMap, vec::Vec};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};
use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    annotation::Dependencies,
    arguments::{Arguments, KeyedArguments, Locals},
    cache::Cache,
    callable::Callable,
    config::Config,
    errors::ResolveErrorKind,
    init::{InitState, InitStep},
    instance::Instance,
    module::Module,
    registry::{ProviderEntry, ProviderKind, Registry, RegistryBuilder},
    resolution::Resolution,
    scope::{Parent, ParentScope},
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety, WeakThreadSafety},
};

/// Name every injector answers with itself.
///
/// The answer is never cached, since the cache would then own its injector.
/// Each lookup gives a fresh [`Instance`] handle, compare the injectors with [`Injector::ptr_eq`].
pub const INJECTOR: &str = "injector";

pub(crate) struct InjectorInner {
    pub(crate) registry: Registry,
    pub(crate) cache: Mutex<Cache>,
    pub(crate) parent: Parent,
    pub(crate) config: Config,
    pub(crate) initializers: Vec<InitStep>,
    pub(crate) state: Mutex<InitState>,
}

/// Resolves named services from the providers of its modules.
///
/// Each service is built lazily on first request and cached for the injector's lifetime.
/// Names without a provider are delegated to the parent.
#[derive(Clone)]
pub struct Injector {
    pub(crate) inner: RcThreadSafety<InjectorInner>,
}

#[derive(Clone)]
pub(crate) struct WeakInjector(WeakThreadSafety<InjectorInner>);

impl WeakInjector {
    #[inline]
    #[must_use]
    pub(crate) fn upgrade(&self) -> Option<Injector> {
        self.0.upgrade().map(|inner| Injector { inner })
    }
}

impl Injector {
    /// Creates a root injector, later modules override providers of earlier ones.
    #[inline]
    #[must_use]
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Self {
        Self::with_config(modules, Config::default())
    }

    #[inline]
    #[must_use]
    pub fn with_config(modules: impl IntoIterator<Item = Module>, config: Config) -> Self {
        Self::build(&modules.into_iter().collect::<Vec<_>>(), Parent::Root, config)
    }

    /// Creates an injector delegating names it has no provider for to `parent`.
    #[inline]
    #[must_use]
    pub fn with_parent<P: ParentScope + 'static>(modules: impl IntoIterator<Item = Module>, parent: P) -> Self {
        Self::build(
            &modules.into_iter().collect::<Vec<_>>(),
            Parent::Custom(RcThreadSafety::new(parent)),
            Config::default(),
        )
    }

    pub(crate) fn build(modules: &[Module], parent: Parent, config: Config) -> Self {
        let inner = RcThreadSafety::new_cyclic(|weak| {
            let (registry, initializers) = RegistryBuilder::new(WeakInjector(weak.clone()), &config).load(modules);
            InjectorInner {
                registry,
                cache: Mutex::new(Cache::new()),
                parent,
                config,
                initializers,
                state: Mutex::new(InitState::Uninitialized),
            }
        });
        Self { inner }
    }

    /// Gets a service, building it and its dependencies on first request.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoProvider`] if neither this injector nor its parents provide a name
    /// - Returns [`ResolveErrorKind::CircularDependency`] if a provider depends on itself
    /// - Returns [`ResolveErrorKind::Instantiate`] if a provider fails
    pub fn get(&self, name: &str) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("get", service = name);
        let _guard = span.enter();

        self.require(name, &mut Resolution::new())
    }

    /// Like [`Self::get`], but a name nobody provides gives `None`.
    ///
    /// # Errors
    /// Returns the same errors as [`Self::get`] for failures other than the missing name itself.
    pub fn get_optional(&self, name: &str) -> Result<Option<Instance>, ResolveErrorKind> {
        let span = info_span!("get_optional", service = name);
        let _guard = span.enter();

        self.resolve(name, false, &mut Resolution::new())
    }

    /// Gets a service and downcasts it.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the service isn't a `T`, see [`Self::get`] for the rest.
    pub fn get_as<T: SendSafety + SyncSafety + 'static>(&self, name: &str) -> Result<RcThreadSafety<T>, ResolveErrorKind> {
        let instance = self.get(name)?;
        instance.downcast::<T>().ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                name: name.into(),
                expected: type_name::<T>(),
                actual: instance.type_name(),
            };
            error!("{}", err);
            err
        })
    }

    /// Calls `callable` with its dependencies resolved from this injector.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::InvalidCallable`] if the callable takes parameters but has no dependency names.
    #[inline]
    pub fn invoke(&self, callable: &Callable) -> Result<Instance, ResolveErrorKind> {
        self.invoke_with(callable, None, &Locals::new())
    }

    /// Calls `callable` with `context` as its receiver, names in `locals` take precedence over providers.
    ///
    /// # Errors
    /// See [`Self::invoke`].
    pub fn invoke_with(&self, callable: &Callable, context: Option<Instance>, locals: &Locals) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("invoke", callable = callable.info().type_name);
        let _guard = span.enter();

        self.call(callable, context, locals, &mut Resolution::new())
    }

    /// Builds a value with `callable` as a constructor, a returned [`Instance`] is kept as is.
    ///
    /// # Errors
    /// See [`Self::invoke`].
    pub fn instantiate(&self, callable: &Callable) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("instantiate", callable = callable.info().type_name);
        let _guard = span.enter();

        self.call(callable, None, &Locals::new(), &mut Resolution::new())
    }

    /// Names of the own providers, exported names of private modules included.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.inner.registry.names()
    }

    #[must_use]
    pub fn provider_kind(&self, name: &str) -> Option<ProviderKind> {
        self.inner.registry.get(name).map(ProviderEntry::kind)
    }

    /// Parent injector, `None` for root injectors and injectors with a custom parent.
    #[must_use]
    pub fn parent(&self) -> Option<Injector> {
        self.inner.parent.injector()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Injector) -> bool {
        RcThreadSafety::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    #[must_use]
    pub(crate) fn id(&self) -> usize {
        RcThreadSafety::as_ptr(&self.inner).cast::<()>() as usize
    }

    /// Returns `true` if `name` has a provider here or in the parent chain.
    pub(crate) fn has_provider(&self, name: &str) -> bool {
        self.inner.registry.contains(name) || self.inner.parent.has_provider(name)
    }

    pub(crate) fn require(&self, name: &str, resolution: &mut Resolution) -> Result<Instance, ResolveErrorKind> {
        match self.resolve(name, true, resolution)? {
            Some(instance) => Ok(instance),
            None => Err(no_provider(name, resolution)),
        }
    }

    pub(crate) fn resolve(&self, name: &str, strict: bool, resolution: &mut Resolution) -> Result<Option<Instance>, ResolveErrorKind> {
        if name == INJECTOR {
            return Ok(Some(Instance::new(self.clone())));
        }

        if name.contains(self.inner.config.separator) && !self.has_provider(name) {
            return self.resolve_path(name, strict, resolution);
        }

        let cached = self.inner.cache.lock().get(name);
        if let Some(instance) = cached {
            debug!(service = name, "Found in cache");
            return Ok(Some(instance));
        }

        let Some(provider) = self.inner.registry.get(name) else {
            debug!(service = name, "No provider, delegating to parent");
            return self.inner.parent.resolve(name, strict, resolution);
        };

        resolution
            .push(self.id(), name, provider.kind() == ProviderKind::PrivateAlias)
            .map_err(|err| {
                error!("{}", err);
                err
            })?;
        let result = self.construct(name, provider, resolution);
        resolution.pop();

        let instance = self.inner.cache.lock().insert(name, result?);
        debug!(service = name, "Cached");
        Ok(Some(instance))
    }

    fn resolve_path(&self, name: &str, strict: bool, resolution: &mut Resolution) -> Result<Option<Instance>, ResolveErrorKind> {
        let mut segments = name.split(self.inner.config.separator);
        let head = segments.next().unwrap_or(name);

        let Some(mut pivot) = self.resolve(head, strict, resolution)? else {
            return Ok(None);
        };
        for segment in segments {
            pivot = match pivot.property(segment) {
                Some(property) => property,
                None => {
                    let err = ResolveErrorKind::NoProperty {
                        name: name.into(),
                        property: segment.into(),
                        path: resolution.path_with(name),
                    };
                    error!("{}", err);
                    return Err(err);
                }
            };
        }
        Ok(Some(pivot))
    }

    fn construct(&self, name: &str, provider: &ProviderEntry, resolution: &mut Resolution) -> Result<Instance, ResolveErrorKind> {
        match provider {
            ProviderEntry::Value(instance) => Ok(instance.clone()),
            ProviderEntry::Factory(callable) | ProviderEntry::Constructor(callable) => {
                self.call(callable, None, &Locals::new(), resolution)
            }
            ProviderEntry::PrivateAlias(private) => private.require(name, resolution),
        }
    }

    pub(crate) fn call(
        &self,
        callable: &Callable,
        context: Option<Instance>,
        locals: &Locals,
        resolution: &mut Resolution,
    ) -> Result<Instance, ResolveErrorKind> {
        let dependencies = callable.resolve_dependencies(self.inner.config.annotator()).map_err(|err| {
            error!("{}", err);
            err
        })?;

        let arguments = match &*dependencies {
            Dependencies::Positional(names) => {
                let mut values = Vec::with_capacity(names.len());
                for name in names {
                    let value = match locals.get(name) {
                        Some(local) => local.cloned(),
                        None => Some(self.require(name, resolution)?),
                    };
                    values.push((name.clone(), value));
                }
                Arguments::positional(context, values)
            }
            Dependencies::Keyed(names) => {
                let mut values = BTreeMap::new();
                for name in names {
                    let value = match locals.get(name) {
                        Some(local) => local.cloned(),
                        None => self.resolve(name, false, resolution)?,
                    };
                    if let Some(value) = value {
                        values.insert(name.clone(), value);
                    }
                }
                Arguments::keyed(context, KeyedArguments::new(values))
            }
        };

        callable.call(arguments).map_err(|source| {
            let err = ResolveErrorKind::Instantiate {
                path: resolution.path(),
                source,
            };
            error!("{}", err);
            err
        })
    }
}

pub(crate) fn no_provider(name: &str, resolution: &Resolution) -> ResolveErrorKind {
    let err = ResolveErrorKind::NoProvider {
        name: name.into(),
        path: resolution.path_with(name),
    };
    error!("{}", err);
    err
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("providers", &self.providers().collect::<Vec<_>>())
            .field("cached", &self.inner.cache.lock().len())
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}
