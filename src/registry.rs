use alloc::{collections::BTreeMap, string::String, vec::Vec};
use tracing::debug;

use crate::{
    callable::Callable,
    config::Config,
    init::{InitStep, InitTarget},
    injector::{Injector, WeakInjector},
    instance::Instance,
    module::Module,
    scope::Parent,
};

/// How a provider builds its service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Value,
    Factory,
    Constructor,
    /// Exported name forwarding to a private module's injector.
    PrivateAlias,
}

#[derive(Clone)]
pub(crate) enum ProviderEntry {
    Value(Instance),
    Factory(Callable),
    Constructor(Callable),
    PrivateAlias(Injector),
}

impl ProviderEntry {
    #[inline]
    #[must_use]
    pub(crate) const fn kind(&self) -> ProviderKind {
        match self {
            Self::Value(_) => ProviderKind::Value,
            Self::Factory(_) => ProviderKind::Factory,
            Self::Constructor(_) => ProviderKind::Constructor,
            Self::PrivateAlias(_) => ProviderKind::PrivateAlias,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn scope_tags(&self) -> &[String] {
        match self {
            Self::Factory(callable) | Self::Constructor(callable) => callable.scope_tags(),
            Self::Value(_) | Self::PrivateAlias(_) => &[],
        }
    }

    #[must_use]
    fn annotated(self, config: &Config) -> Self {
        match self {
            Self::Factory(callable) => Self::Factory(callable.annotated(config.annotator())),
            Self::Constructor(callable) => Self::Constructor(callable.annotated(config.annotator())),
            entry => entry,
        }
    }
}

/// Provider table of one injector, immutable once built.
#[derive(Clone)]
pub(crate) struct Registry<P = ProviderEntry> {
    providers: BTreeMap<String, P>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }
}

impl<P> Registry<P> {
    /// Registers `provider`, replacing the one registered earlier under the same name.
    #[inline]
    pub(crate) fn insert(&mut self, name: String, provider: P) {
        self.providers.insert(name, provider);
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, name: &str) -> Option<&P> {
        self.providers.get(name)
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &P)> {
        self.providers.iter().map(|(name, provider)| (name.as_str(), provider))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.providers.len()
    }
}

/// Loads modules into a provider table and the initializer sequence of the injector being built.
pub(crate) struct RegistryBuilder<'a> {
    injector: WeakInjector,
    config: &'a Config,
    registry: Registry,
    initializers: Vec<InitStep>,
    scheduled: Vec<Module>,
    pending: Vec<Module>,
}

impl<'a> RegistryBuilder<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(injector: WeakInjector, config: &'a Config) -> Self {
        Self {
            injector,
            config,
            registry: Registry::default(),
            initializers: Vec::new(),
            scheduled: Vec::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn load(mut self, modules: &[Module]) -> (Registry, Vec<InitStep>) {
        for module in modules {
            self.schedule(module);
        }
        debug!(
            modules = self.scheduled.len(),
            providers = self.registry.len(),
            "Modules loaded"
        );
        (self.registry, self.initializers)
    }

    /// Schedules `depends` first, then the module itself, each module once.
    ///
    /// A module still waiting for its own `depends` is skipped, which breaks `depends` cycles.
    fn schedule(&mut self, module: &Module) {
        if self
            .scheduled
            .iter()
            .chain(&self.pending)
            .any(|scheduled| scheduled.ptr_eq(module))
        {
            debug!("Module already scheduled");
            return;
        }

        self.pending.push(module.clone());
        for dependency in &module.inner.depends {
            self.schedule(dependency);
        }
        self.pending.pop();

        self.scheduled.push(module.clone());
        self.register(module);
    }

    fn register(&mut self, module: &Module) {
        if let Some(exports) = module.exports() {
            self.register_private(module, exports);
            return;
        }

        for (name, provider) in &module.inner.providers {
            self.registry.insert(name.clone(), provider.clone().annotated(self.config));
        }
        for initializer in &module.inner.initializers {
            self.initializers
                .push(InitStep::new(InitTarget::Local, initializer.clone().annotated(self.config)));
        }
    }

    /// Builds the private injector, nested modules first, and aliases the exported names to it.
    fn register_private(&mut self, module: &Module, exports: &[String]) {
        let mut modules = module.inner.nested.clone();
        modules.push(module.internals());

        let private = Injector::build(&modules, Parent::Enclosing(self.injector.clone()), self.config.clone());

        for name in exports {
            self.registry
                .insert(name.clone(), ProviderEntry::PrivateAlias(private.clone()));
        }

        self.initializers.push(InitStep::private_init(private.clone()));
        for initializer in &module.inner.initializers {
            self.initializers.push(InitStep::new(
                InitTarget::Private(private.clone()),
                initializer.clone().annotated(self.config),
            ));
        }
        debug!(exports = exports.len(), "Private module registered");
    }
}
