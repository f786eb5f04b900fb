//! Injector whose providers may suspend, behind the `async` feature.
//!
//! Sibling dependencies of a provider resolve concurrently.
//! Child injectors, private modules and initializers are available on [`crate::Injector`] only.

mod callable;
mod injector;
mod module;

pub use callable::{annotate, AsyncCallable, AsyncFunction};
pub use injector::AsyncInjector;
pub use module::{AsyncModule, AsyncModuleBuilder};
