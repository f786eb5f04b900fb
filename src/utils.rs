#[cfg(feature = "async")]
pub(crate) mod future;
pub mod thread_safety;
