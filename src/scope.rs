use alloc::{
    collections::{BTreeMap, BTreeSet},
    string::String,
    vec::Vec,
};
use tracing::{debug, error, info_span};

use crate::{
    errors::{ResolveErrorKind, ScopeErrorKind},
    injector::{no_provider, Injector, WeakInjector},
    instance::Instance,
    module::Module,
    registry::ProviderEntry,
    resolution::Resolution,
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
};

/// Scope an injector delegates to for names it has no provider for.
pub trait ParentScope: SendSafety + SyncSafety {
    /// Resolves `name`, with `strict` unset a missing name gives `Ok(None)`.
    ///
    /// # Errors
    /// Returns an error if the name is missing in strict mode or can't be built.
    fn get(&self, name: &str, strict: bool) -> Result<Option<Instance>, ResolveErrorKind>;

    /// Used to decide whether a separator in a name addresses a property path.
    fn has_provider(&self, _name: &str) -> bool {
        false
    }
}

impl ParentScope for Injector {
    fn get(&self, name: &str, strict: bool) -> Result<Option<Instance>, ResolveErrorKind> {
        if strict {
            Injector::get(self, name).map(Some)
        } else {
            self.get_optional(name)
        }
    }

    fn has_provider(&self, name: &str) -> bool {
        Injector::has_provider(self, name)
    }
}

#[derive(Clone)]
pub(crate) enum Parent {
    /// Empty root, strict lookups fail and the others give `None`.
    Root,
    Injector(Injector),
    /// Injector owning a private module's injector.
    Enclosing(WeakInjector),
    Custom(RcThreadSafety<dyn ParentScope>),
}

impl Parent {
    pub(crate) fn resolve(&self, name: &str, strict: bool, resolution: &mut Resolution) -> Result<Option<Instance>, ResolveErrorKind> {
        match self {
            Self::Root => {
                if strict {
                    return Err(no_provider(name, resolution));
                }
                Ok(None)
            }
            Self::Injector(injector) => injector.resolve(name, strict, resolution),
            Self::Enclosing(weak) => match weak.upgrade() {
                Some(injector) => injector.resolve(name, strict, resolution),
                None => Self::Root.resolve(name, strict, resolution),
            },
            Self::Custom(scope) => scope.get(name, strict),
        }
    }

    pub(crate) fn has_provider(&self, name: &str) -> bool {
        match self {
            Self::Root => false,
            Self::Injector(injector) => injector.has_provider(name),
            Self::Enclosing(weak) => weak.upgrade().is_some_and(|injector| injector.has_provider(name)),
            Self::Custom(scope) => scope.has_provider(name),
        }
    }

    #[must_use]
    pub(crate) fn injector(&self) -> Option<Injector> {
        match self {
            Self::Injector(injector) => Some(injector.clone()),
            Self::Enclosing(weak) => weak.upgrade(),
            Self::Root | Self::Custom(_) => None,
        }
    }
}

/// Which providers are candidates for forcing.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Search {
    /// Own providers and the ones of parent injectors.
    Visible,
    /// Own providers only, names without a match are skipped.
    Own,
}

impl Injector {
    /// Creates a child injector loading `modules` and delegating the rest to this injector.
    ///
    /// Every provider visible from here whose name or scope tag is in `forced`
    /// is copied into the child, so the child builds its own instance instead of sharing the cached one.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::NoProviderForForcedScope`] if a forced name or tag matches no provider.
    pub fn create_child(&self, modules: impl IntoIterator<Item = Module>, forced: &[&str]) -> Result<Injector, ScopeErrorKind> {
        let span = info_span!("create_child", forced = forced.len());
        let _guard = span.enter();

        self.create_child_inner(modules.into_iter().collect(), forced, Search::Visible)
            .map(|(child, _)| child)
    }

    /// Returns the child and the forced names and tags that matched a provider,
    /// those matched inside forced private modules included.
    fn create_child_inner(
        &self,
        modules: Vec<Module>,
        forced: &[&str],
        search: Search,
    ) -> Result<(Injector, BTreeSet<String>), ScopeErrorKind> {
        let mut overrides = Vec::new();
        let mut matched = BTreeSet::new();
        // Private injectors forced in this call, paired with their fresh child
        let mut privates: Vec<(Injector, Injector)> = Vec::new();

        for (name, provider) in self.forceable_providers(search) {
            let tags = provider.scope_tags();
            let forced_tags = forced
                .iter()
                .filter(|forced_tag| tags.iter().any(|scope_tag| scope_tag == *forced_tag))
                .map(|forced_tag| String::from(*forced_tag))
                .collect::<Vec<_>>();
            let by_name = forced.contains(&name.as_str());

            if !by_name && forced_tags.is_empty() {
                continue;
            }
            if by_name {
                matched.insert(name.clone());
            } else {
                debug!(service = name.as_str(), tags = forced_tags.len(), "Forced by scope tag");
            }
            matched.extend(forced_tags);

            let provider = match provider {
                ProviderEntry::PrivateAlias(private) => {
                    let fresh = match privates.iter().find(|(original, _)| original.ptr_eq(&private)) {
                        Some((_, fresh)) => fresh.clone(),
                        None => {
                            let (fresh, reached) = private.create_child_inner(Vec::new(), forced, Search::Own)?;
                            matched.extend(reached);
                            privates.push((private, fresh.clone()));
                            fresh
                        }
                    };
                    ProviderEntry::PrivateAlias(fresh)
                }
                provider => provider,
            };
            overrides.push((name, provider));
        }

        if search == Search::Visible {
            if let Some(missing) = forced.iter().find(|name| !matched.contains(**name)) {
                let err = ScopeErrorKind::NoProviderForForcedScope {
                    name: String::from(*missing),
                };
                error!("{}", err);
                return Err(err);
            }
        }

        debug!(overrides = overrides.len(), "Child created");

        let mut child_modules = Vec::with_capacity(modules.len() + 1);
        child_modules.push(Module::from_providers(overrides));
        child_modules.extend(modules);

        let child = Injector::build(&child_modules, Parent::Injector(self.clone()), self.inner.config.clone());
        Ok((child, matched))
    }

    /// Providers by name, an injector's own shadowing the ones of its parents.
    fn forceable_providers(&self, search: Search) -> BTreeMap<String, ProviderEntry> {
        let mut providers = BTreeMap::new();
        let mut current = Some(self.clone());

        while let Some(injector) = current {
            for (name, provider) in injector.inner.registry.iter() {
                providers
                    .entry(String::from(name))
                    .or_insert_with(|| provider.clone());
            }
            current = match search {
                Search::Visible => injector.parent(),
                Search::Own => None,
            };
        }
        providers
    }
}
