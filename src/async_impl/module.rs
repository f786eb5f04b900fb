use alloc::{string::String, vec::Vec};

use super::callable::AsyncCallable;
use crate::{
    config::Config,
    instance::Instance,
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
};

#[derive(Clone)]
pub(crate) enum AsyncProvider {
    Value(Instance),
    Factory(AsyncCallable),
    Constructor(AsyncCallable),
}

impl AsyncProvider {
    pub(crate) fn annotated(self, config: &Config) -> Self {
        match self {
            Self::Factory(callable) => Self::Factory(callable.annotated(config.annotator())),
            Self::Constructor(callable) => Self::Constructor(callable.annotated(config.annotator())),
            provider => provider,
        }
    }
}

/// Declarations of named async providers.
#[derive(Clone)]
pub struct AsyncModule {
    pub(crate) providers: RcThreadSafety<Vec<(String, AsyncProvider)>>,
}

impl AsyncModule {
    #[inline]
    #[must_use]
    pub fn builder() -> AsyncModuleBuilder {
        AsyncModuleBuilder::default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Default)]
pub struct AsyncModuleBuilder {
    providers: Vec<(String, AsyncProvider)>,
}

impl AsyncModuleBuilder {
    #[must_use]
    pub fn value<T: SendSafety + SyncSafety + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.providers.push((name.into(), AsyncProvider::Value(Instance::new(value))));
        self
    }

    #[must_use]
    pub fn factory(mut self, name: impl Into<String>, callable: AsyncCallable) -> Self {
        self.providers.push((name.into(), AsyncProvider::Factory(callable)));
        self
    }

    /// Declares a constructor, a returned [`Instance`] is used as is.
    #[must_use]
    pub fn constructor(mut self, name: impl Into<String>, callable: AsyncCallable) -> Self {
        self.providers.push((name.into(), AsyncProvider::Constructor(callable)));
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> AsyncModule {
        AsyncModule {
            providers: RcThreadSafety::new(self.providers),
        }
    }
}
