#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod annotation;
pub(crate) mod arguments;
pub(crate) mod cache;
pub(crate) mod callable;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod init;
pub(crate) mod injector;
pub(crate) mod instance;
pub(crate) mod module;
pub(crate) mod registry;
pub(crate) mod resolution;
pub(crate) mod scope;
pub(crate) mod service;
pub mod utils;

#[cfg(feature = "async")]
pub mod async_impl;

pub use annotation::{Annotator, CallableInfo, Dependencies, StaticAnnotator, KEYED_MARKER};
pub use arguments::{Argument, Arguments, FromArgument, KeyedArguments, Locals};
pub use callable::{annotate, Callable, Function};
pub use config::Config;
pub use errors::{InitErrorKind, InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind};
pub use injector::{Injector, INJECTOR};
pub use instance::{Instance, Properties};
pub use module::{Module, ModuleBuilder};
pub use registry::ProviderKind;
pub use resolution::ResolutionPath;
pub use scope::ParentScope;
