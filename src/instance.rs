use alloc::{collections::BTreeMap, string::String};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};

use crate::utils::thread_safety::{BoxAnyThreadSafety, RcAnyThreadSafety, RcThreadSafety, SendSafety, SyncSafety};

/// Named properties of a service value.
///
/// Separator paths like `config.port` and keyed arguments are navigated through this trait,
/// so a value has to be registered with [`Instance::with_properties`] to be addressable by path.
pub trait Properties: SendSafety + SyncSafety {
    #[must_use]
    fn property(&self, key: &str) -> Option<Instance>;
}

impl Properties for BTreeMap<String, Instance> {
    #[inline]
    fn property(&self, key: &str) -> Option<Instance> {
        self.get(key).cloned()
    }
}

/// Type-erased, reference counted service value.
///
/// Cloning an instance is cheap and keeps its identity, see [`Instance::ptr_eq`].
#[derive(Clone)]
pub struct Instance {
    value: RcAnyThreadSafety,
    properties: Option<RcThreadSafety<dyn Properties>>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps a value into a new instance.
    ///
    /// Passing an [`Instance`] returns it unchanged instead of nesting it,
    /// which is how constructors hand back an already existing instance.
    #[must_use]
    pub fn new<T: SendSafety + SyncSafety + 'static>(value: T) -> Self {
        let boxed: BoxAnyThreadSafety = alloc::boxed::Box::new(value);
        match boxed.downcast::<Instance>() {
            Ok(instance) => *instance,
            Err(boxed) => Self {
                value: RcThreadSafety::from(boxed),
                properties: None,
                type_name: type_name::<T>(),
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn from_rc<T: SendSafety + SyncSafety + 'static>(value: RcThreadSafety<T>) -> Self {
        Self {
            value: value as RcAnyThreadSafety,
            properties: None,
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_properties<T: Properties + 'static>(value: T) -> Self {
        let value = RcThreadSafety::new(value);
        Self {
            value: value.clone() as RcAnyThreadSafety,
            properties: Some(value as RcThreadSafety<dyn Properties>),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn downcast<T: SendSafety + SyncSafety + 'static>(&self) -> Option<RcThreadSafety<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Looks up a named property, `None` if the value exposes no properties or lacks the key.
    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Instance> {
        self.properties.as_ref().and_then(|properties| properties.property(key))
    }

    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both instances point to the same value.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        RcThreadSafety::as_ptr(&self.value).cast::<()>() == RcThreadSafety::as_ptr(&other.value).cast::<()>()
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties.is_some())
            .finish()
    }
}
