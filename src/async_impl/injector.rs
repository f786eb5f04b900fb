use alloc::{
    boxed::Box,
    collections::{BTreeMap, BTreeSet},
    string::{String, ToString as _},
    vec,
    vec::Vec,
};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};
use futures_util::future::{try_join_all, FutureExt as _, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info_span, Instrument as _};

use super::{
    callable::AsyncCallable,
    module::{AsyncModule, AsyncProvider},
};
use crate::{
    annotation::Dependencies,
    arguments::{Arguments, KeyedArguments, Locals},
    cache::Cache,
    config::Config,
    errors::ResolveErrorKind,
    injector::{no_provider, INJECTOR},
    instance::Instance,
    registry::Registry,
    resolution::Resolution,
    utils::{
        future::BoxFuture,
        thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
    },
};

type SharedBuild = Shared<BoxFuture<'static, Option<Instance>>>;

/// Build of an uncached service that callers wait on instead of starting their own.
struct Pending {
    /// Gives `None` if the build failed, the error goes to the caller that started it.
    build: SharedBuild,
    /// Services this build is waiting on, once per waiting branch.
    waits: Vec<String>,
}

struct AsyncInjectorInner {
    registry: Registry<AsyncProvider>,
    cache: Mutex<Cache>,
    pending: Mutex<BTreeMap<String, Pending>>,
    config: Config,
}

/// Resolves named services whose providers may suspend.
///
/// No lock is held across an `.await`.
/// Callers racing for an uncached service share one run of its factory.
/// A caller whose wait would close a loop of builds waiting on each other builds on its own, which reports the cycle.
#[derive(Clone)]
pub struct AsyncInjector {
    inner: RcThreadSafety<AsyncInjectorInner>,
}

impl AsyncInjector {
    #[inline]
    #[must_use]
    pub fn new(modules: impl IntoIterator<Item = AsyncModule>) -> Self {
        Self::with_config(modules, Config::default())
    }

    #[must_use]
    pub fn with_config(modules: impl IntoIterator<Item = AsyncModule>, config: Config) -> Self {
        let mut registry = Registry::default();
        for module in modules {
            for (name, provider) in module.providers.iter() {
                registry.insert(name.clone(), provider.clone().annotated(&config));
            }
        }
        debug!(providers = registry.len(), "Modules loaded");

        Self {
            inner: RcThreadSafety::new(AsyncInjectorInner {
                registry,
                cache: Mutex::new(Cache::new()),
                pending: Mutex::new(BTreeMap::new()),
                config,
            }),
        }
    }

    /// Gets a service, building it and its dependencies on first request.
    ///
    /// # Errors
    /// See [`crate::Injector::get`].
    pub async fn get(&self, name: &str) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("get", service = name);
        self.require(name, Resolution::new()).instrument(span).await
    }

    /// Like [`Self::get`], but a name nobody provides gives `None`.
    ///
    /// # Errors
    /// See [`crate::Injector::get_optional`].
    pub async fn get_optional(&self, name: &str) -> Result<Option<Instance>, ResolveErrorKind> {
        let span = info_span!("get_optional", service = name);
        self.resolve(name, false, Resolution::new()).instrument(span).await
    }

    /// # Errors
    /// See [`crate::Injector::get_as`].
    pub async fn get_as<T: SendSafety + SyncSafety + 'static>(&self, name: &str) -> Result<RcThreadSafety<T>, ResolveErrorKind> {
        let instance = self.get(name).await?;
        instance.downcast::<T>().ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                name: name.to_string(),
                expected: type_name::<T>(),
                actual: instance.type_name(),
            };
            error!("{}", err);
            err
        })
    }

    /// # Errors
    /// See [`crate::Injector::invoke`].
    #[inline]
    pub async fn invoke(&self, callable: &AsyncCallable) -> Result<Instance, ResolveErrorKind> {
        self.invoke_with(callable, None, &Locals::new()).await
    }

    /// # Errors
    /// See [`crate::Injector::invoke`].
    pub async fn invoke_with(&self, callable: &AsyncCallable, context: Option<Instance>, locals: &Locals) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("invoke", callable = callable.info().type_name);
        self.call(callable, context, locals, &Resolution::new()).instrument(span).await
    }

    /// # Errors
    /// See [`crate::Injector::invoke`].
    pub async fn instantiate(&self, callable: &AsyncCallable) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("instantiate", callable = callable.info().type_name);
        self.call(callable, None, &Locals::new(), &Resolution::new())
            .instrument(span)
            .await
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.inner.registry.names()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &AsyncInjector) -> bool {
        RcThreadSafety::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    fn id(&self) -> usize {
        RcThreadSafety::as_ptr(&self.inner).cast::<()>() as usize
    }

    async fn require(&self, name: &str, resolution: Resolution) -> Result<Instance, ResolveErrorKind> {
        match self.resolve(name, true, resolution.clone()).await? {
            Some(instance) => Ok(instance),
            None => Err(no_provider(name, &resolution)),
        }
    }

    /// Boxed so that resolution can recurse through providers.
    fn resolve<'a>(&'a self, name: &'a str, strict: bool, resolution: Resolution) -> BoxFuture<'a, Result<Option<Instance>, ResolveErrorKind>> {
        Box::pin(self.resolve_inner(name, strict, resolution))
    }

    async fn resolve_inner(&self, name: &str, strict: bool, mut resolution: Resolution) -> Result<Option<Instance>, ResolveErrorKind> {
        if name == INJECTOR {
            return Ok(Some(Instance::new(self.clone())));
        }

        if name.contains(self.inner.config.separator) && !self.inner.registry.contains(name) {
            return self.resolve_path(name, strict, resolution).await;
        }

        let cached = self.inner.cache.lock().get(name);
        if let Some(instance) = cached {
            debug!(service = name, "Found in cache");
            return Ok(Some(instance));
        }

        let Some(provider) = self.inner.registry.get(name) else {
            if strict {
                return Err(no_provider(name, &resolution));
            }
            return Ok(None);
        };

        resolution.push(self.id(), name, false).map_err(|err| {
            error!("{}", err);
            err
        })?;
        let callable = match provider {
            AsyncProvider::Value(instance) => {
                let instance = self.inner.cache.lock().insert(name, instance.clone());
                debug!(service = name, "Cached");
                return Ok(Some(instance));
            }
            AsyncProvider::Factory(callable) | AsyncProvider::Constructor(callable) => callable,
        };

        let failure = RcThreadSafety::new(Mutex::new(None));
        let build = {
            let mut pending = self.inner.pending.lock();
            let cached = self.inner.cache.lock().get(name);
            if let Some(instance) = cached {
                debug!(service = name, "Found in cache");
                return Ok(Some(instance));
            }

            let build = match pending.get(name) {
                Some(_) if self.closes_loop(&pending, name, &resolution) => None,
                Some(entry) => {
                    debug!(service = name, "Waiting on pending build");
                    Some(entry.build.clone())
                }
                None => {
                    let build = self
                        .clone()
                        .build(name.to_string(), callable.clone(), resolution.clone(), failure.clone());
                    pending.insert(
                        name.to_string(),
                        Pending {
                            build: build.clone(),
                            waits: Vec::new(),
                        },
                    );
                    Some(build)
                }
            };
            if build.is_some() {
                if let Some(entry) = resolution.requester().and_then(|requester| pending.get_mut(requester)) {
                    entry.waits.push(name.to_string());
                }
            }
            build
        };

        let Some(build) = build else {
            debug!(service = name, "Building apart from pending build");
            return self.construct(callable, name, &resolution).await.map(Some);
        };

        let edge = WaitEdge {
            injector: self,
            requester: resolution.requester(),
            name,
        };
        let built = build.await;
        drop(edge);

        if let Some(instance) = built {
            return Ok(Some(instance));
        }
        let failed = failure.lock().take();
        match failed {
            Some(err) => Err(err),
            None => self.construct(callable, name, &resolution).await.map(Some),
        }
    }

    /// Runs `callable` once for `name`, the cache keeping the first instance.
    async fn construct(&self, callable: &AsyncCallable, name: &str, resolution: &Resolution) -> Result<Instance, ResolveErrorKind> {
        let instance = self.call(callable, None, &Locals::new(), resolution).await?;
        let instance = self.inner.cache.lock().insert(name, instance);
        debug!(service = name, "Cached");
        Ok(instance)
    }

    fn build(
        self,
        name: String,
        callable: AsyncCallable,
        resolution: Resolution,
        failure: RcThreadSafety<Mutex<Option<ResolveErrorKind>>>,
    ) -> SharedBuild {
        let build: BoxFuture<'static, Option<Instance>> = Box::pin(async move {
            let result = self.construct(&callable, &name, &resolution).await;
            self.inner.pending.lock().remove(&name);
            match result {
                Ok(instance) => Some(instance),
                Err(err) => {
                    *failure.lock() = Some(err);
                    None
                }
            }
        });
        build.shared()
    }

    /// Whether the pending build of `name` waits, directly or not, on a service this branch is resolving.
    fn closes_loop(&self, pending: &BTreeMap<String, Pending>, name: &str, resolution: &Resolution) -> bool {
        let mut queue = vec![name];
        let mut seen = BTreeSet::new();

        while let Some(current) = queue.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(entry) = pending.get(current) else {
                continue;
            };
            for next in &entry.waits {
                if resolution.contains(self.id(), next) {
                    return true;
                }
                queue.push(next.as_str());
            }
        }
        false
    }

    async fn resolve_path(&self, name: &str, strict: bool, resolution: Resolution) -> Result<Option<Instance>, ResolveErrorKind> {
        let mut segments = name.split(self.inner.config.separator);
        let head = segments.next().unwrap_or(name);

        let Some(mut pivot) = self.resolve(head, strict, resolution.clone()).await? else {
            return Ok(None);
        };
        for segment in segments {
            pivot = match pivot.property(segment) {
                Some(property) => property,
                None => {
                    let err = ResolveErrorKind::NoProperty {
                        name: name.to_string(),
                        property: segment.to_string(),
                        path: resolution.path_with(name),
                    };
                    error!("{}", err);
                    return Err(err);
                }
            };
        }
        Ok(Some(pivot))
    }

    /// Resolves all dependencies concurrently, each branch with its own copy of `resolution`.
    async fn call(
        &self,
        callable: &AsyncCallable,
        context: Option<Instance>,
        locals: &Locals,
        resolution: &Resolution,
    ) -> Result<Instance, ResolveErrorKind> {
        let dependencies = callable.resolve_dependencies(self.inner.config.annotator()).map_err(|err| {
            error!("{}", err);
            err
        })?;

        let arguments = match &*dependencies {
            Dependencies::Positional(names) => {
                let values = try_join_all(names.iter().map(|name| self.positional(name, locals, resolution.clone()))).await?;
                Arguments::positional(context, values)
            }
            Dependencies::Keyed(names) => {
                let values = try_join_all(names.iter().map(|name| self.keyed(name, locals, resolution.clone()))).await?;
                Arguments::keyed(context, KeyedArguments::new(values.into_iter().flatten().collect()))
            }
        };

        callable.call(arguments).await.map_err(|source| {
            let err = ResolveErrorKind::Instantiate {
                path: resolution.path(),
                source,
            };
            error!("{}", err);
            err
        })
    }

    async fn positional(&self, name: &str, locals: &Locals, resolution: Resolution) -> Result<(String, Option<Instance>), ResolveErrorKind> {
        let value = match locals.get(name) {
            Some(local) => local.cloned(),
            None => Some(self.require(name, resolution).await?),
        };
        Ok((name.to_string(), value))
    }

    async fn keyed(&self, name: &str, locals: &Locals, resolution: Resolution) -> Result<Option<(String, Instance)>, ResolveErrorKind> {
        let value = match locals.get(name) {
            Some(local) => local.cloned(),
            None => self.resolve(name, false, resolution).await?,
        };
        Ok(value.map(|value| (name.to_string(), value)))
    }
}

/// Marks `requester` as waiting on `name` until dropped.
struct WaitEdge<'a> {
    injector: &'a AsyncInjector,
    requester: Option<&'a str>,
    name: &'a str,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        let Some(requester) = self.requester else {
            return;
        };
        let mut pending = self.injector.inner.pending.lock();
        if let Some(entry) = pending.get_mut(requester) {
            if let Some(index) = entry.waits.iter().position(|name| name == self.name) {
                entry.waits.swap_remove(index);
            }
        }
    }
}

impl Debug for AsyncInjector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInjector")
            .field("providers", &self.providers().collect::<Vec<_>>())
            .field("cached", &self.inner.cache.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::AsyncInjector;
    use crate::{
        annotation::{Annotator, CallableInfo, Dependencies},
        async_impl::{annotate, AsyncCallable, AsyncModule},
        config::Config,
        errors::ResolveErrorKind,
        utils::thread_safety::RcThreadSafety,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        vec,
    };
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    struct CountingAnnotator(RcThreadSafety<Mutex<usize>>);

    impl Annotator for CountingAnnotator {
        fn annotate(&self, callable: &CallableInfo) -> Option<Dependencies> {
            *self.0.lock() += 1;
            (callable.arity == 1).then(|| Dependencies::Positional(vec![String::from("power")]))
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_get_builds_once() {
        let module = AsyncModule::builder()
            .value("a", 1_u32)
            .factory("b", annotate(["a"], |a: RcThreadSafety<u32>| async move { Ok(*a + 1) }))
            .factory("c", annotate(["b"], |b: RcThreadSafety<u32>| async move { Ok(*b * 2) }))
            .build();
        let injector = AsyncInjector::new([module]);

        assert_eq!(*injector.get_as::<u32>("c").await.unwrap(), 4);
        assert!(injector.get("c").await.unwrap().ptr_eq(&injector.get("c").await.unwrap()));
        assert!(logs_contain("Found in cache"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_cycle() {
        let module = AsyncModule::builder()
            .factory("a", annotate(["b"], |_: RcThreadSafety<u8>| async move { Ok(1_u8) }))
            .factory("b", annotate(["a"], |_: RcThreadSafety<u8>| async move { Ok(2_u8) }))
            .build();
        let injector = AsyncInjector::new([module]);

        let err = injector.get("a").await.unwrap_err();
        assert!(matches!(err, ResolveErrorKind::CircularDependency { .. }));
        assert_eq!(err.to_string(), "Cannot resolve circular dependency! (Resolving: a -> b -> a)");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_invalid_callable() {
        let injector = AsyncInjector::new([]);
        let callable = AsyncCallable::new(|value: RcThreadSafety<u8>| async move { Ok(*value) });

        assert!(matches!(
            injector.invoke(&callable).await,
            Err(ResolveErrorKind::InvalidCallable { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_annotator_consulted_at_registration() {
        let calls = RcThreadSafety::new(Mutex::new(0));
        let module = AsyncModule::builder()
            .value("power", 100_u32)
            .factory("doubled", AsyncCallable::new(|power: RcThreadSafety<u32>| async move { Ok(*power * 2) }))
            .build();
        let injector = AsyncInjector::with_config([module], Config::default().with_annotator(CountingAnnotator(calls.clone())));

        assert_eq!(*calls.lock(), 1);
        assert_eq!(*injector.get_as::<u32>("doubled").await.unwrap(), 200);
        assert_eq!(*calls.lock(), 1);
    }
}
