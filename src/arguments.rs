use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    vec::Vec,
};
use core::any::type_name;

use crate::{
    annotation::KEYED_MARKER,
    errors::InstantiateErrorKind,
    instance::{Instance, Properties},
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
};

/// Overrides consulted before the injector when a callable's dependencies are resolved.
///
/// A name set with [`Locals::undefined`] is passed as an explicitly missing argument
/// instead of being resolved.
#[derive(Clone, Debug, Default)]
pub struct Locals(BTreeMap<String, Option<Instance>>);

impl Locals {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with<T: SendSafety + SyncSafety + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, Instance::new(value));
        self
    }

    #[must_use]
    pub fn undefined(mut self, name: impl Into<String>) -> Self {
        self.0.insert(name.into(), None);
        self
    }

    #[inline]
    pub fn insert(&mut self, name: impl Into<String>, instance: Instance) {
        self.0.insert(name.into(), Some(instance));
    }

    /// `None` if the name isn't overridden, `Some(None)` if it's overridden as undefined.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<&Instance>> {
        self.0.get(name).map(Option::as_ref)
    }
}

/// Dependencies bundled into a single argument by the keyed convention.
///
/// Names that resolved to nothing are absent.
#[derive(Clone, Debug, Default)]
pub struct KeyedArguments(BTreeMap<String, Instance>);

impl KeyedArguments {
    #[inline]
    #[must_use]
    pub(crate) fn new(values: BTreeMap<String, Instance>) -> Self {
        Self(values)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.0.get(name)
    }

    #[inline]
    #[must_use]
    pub fn get_as<T: SendSafety + SyncSafety + 'static>(&self, name: &str) -> Option<RcThreadSafety<T>> {
        self.0.get(name).and_then(Instance::downcast)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.0.iter().map(|(name, instance)| (name.as_str(), instance))
    }
}

impl Properties for KeyedArguments {
    #[inline]
    fn property(&self, key: &str) -> Option<Instance> {
        self.0.get(key).cloned()
    }
}

/// Resolved arguments of one call, in dependency order.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    context: Option<Instance>,
    values: Vec<(String, Option<Instance>)>,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub(crate) fn positional(context: Option<Instance>, values: Vec<(String, Option<Instance>)>) -> Self {
        Self { context, values }
    }

    #[must_use]
    pub(crate) fn keyed(context: Option<Instance>, values: KeyedArguments) -> Self {
        Self {
            context,
            values: alloc::vec![(KEYED_MARKER.to_string(), Some(Instance::with_properties(values)))],
        }
    }

    /// Receiver passed to [`crate::Injector::invoke_with`], never set for providers.
    #[inline]
    #[must_use]
    pub fn context(&self) -> Option<&Instance> {
        self.context.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(|(_, value)| value.as_ref())
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Instance> {
        self.values
            .iter()
            .find(|(value_name, _)| value_name == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Keyed bundle, if the callable uses the keyed convention.
    #[must_use]
    pub fn keyed_arguments(&self) -> Option<RcThreadSafety<KeyedArguments>> {
        self.by_name(KEYED_MARKER).and_then(Instance::downcast)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Argument<'_>> {
        self.values.iter().map(|(name, value)| Argument {
            name,
            value: value.as_ref(),
        })
    }
}

/// One resolved argument, `value` is `None` if it was overridden as undefined.
#[derive(Clone, Copy, Debug)]
pub struct Argument<'a> {
    pub name: &'a str,
    pub value: Option<&'a Instance>,
}

/// Extracts a typed parameter of a callable from its resolved argument.
///
/// `None` means the callable declared fewer dependencies than it has parameters.
pub trait FromArgument: Sized {
    /// # Errors
    /// Returns [`InstantiateErrorKind::MissingArgument`] or [`InstantiateErrorKind::IncorrectType`]
    /// if the argument can't become `Self`.
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind>;
}

fn required(argument: Option<Argument<'_>>) -> Result<(&str, &Instance), InstantiateErrorKind> {
    match argument {
        Some(Argument {
            name,
            value: Some(value),
        }) => Ok((name, value)),
        Some(Argument { name, value: None }) => Err(InstantiateErrorKind::MissingArgument { name: name.to_string() }),
        None => Err(InstantiateErrorKind::MissingArgument {
            name: String::from("<undeclared>"),
        }),
    }
}

fn downcast<T: SendSafety + SyncSafety + 'static>(name: &str, value: &Instance) -> Result<RcThreadSafety<T>, InstantiateErrorKind> {
    value.downcast::<T>().ok_or_else(|| InstantiateErrorKind::IncorrectType {
        name: name.to_string(),
        expected: type_name::<T>(),
        actual: value.type_name(),
    })
}

impl FromArgument for Instance {
    #[inline]
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind> {
        required(argument).map(|(_, value)| value.clone())
    }
}

impl FromArgument for Option<Instance> {
    #[inline]
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind> {
        Ok(argument.and_then(|argument| argument.value).cloned())
    }
}

impl<T: SendSafety + SyncSafety + 'static> FromArgument for RcThreadSafety<T> {
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind> {
        let (name, value) = required(argument)?;
        downcast(name, value)
    }
}

impl<T: SendSafety + SyncSafety + 'static> FromArgument for Option<RcThreadSafety<T>> {
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind> {
        match argument {
            Some(Argument {
                name,
                value: Some(value),
            }) => downcast(name, value).map(Some),
            _ => Ok(None),
        }
    }
}

impl FromArgument for KeyedArguments {
    fn from_argument(argument: Option<Argument<'_>>) -> Result<Self, InstantiateErrorKind> {
        let (name, value) = required(argument)?;
        downcast::<KeyedArguments>(name, value).map(|keyed| (*keyed).clone())
    }
}
