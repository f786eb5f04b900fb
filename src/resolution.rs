use alloc::{
    string::{String, ToString as _},
    vec::Vec,
};
use core::fmt::{self, Display, Formatter};

use crate::errors::ResolveErrorKind;

/// Root-to-failure chain of service names, displayed as `a -> b -> c`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionPath(Vec<String>);

impl ResolutionPath {
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ResolutionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, name) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for ResolutionPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone, Debug)]
struct Frame {
    injector: usize,
    name: String,
    forwarding: bool,
}

/// Names in flight for one top-level call.
///
/// Threaded by reference through the recursive resolution, so it starts and ends empty.
/// A name is only a cycle when it is revisited within the same injector,
/// the same name in a child and its parent is a legal delegation.
#[derive(Clone, Debug, Default)]
pub(crate) struct Resolution {
    stack: Vec<Frame>,
}

impl Resolution {
    #[inline]
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Pushes `name` resolved by `injector`.
    ///
    /// A forwarding frame belongs to a private alias and is hidden from paths unless it's the last one.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CircularDependency`] if the pair is already in flight.
    /// The frame stays pushed, so the error path ends with the revisited name.
    pub(crate) fn push(&mut self, injector: usize, name: &str, forwarding: bool) -> Result<(), ResolveErrorKind> {
        let revisited = self.contains(injector, name);

        self.stack.push(Frame {
            injector,
            name: name.to_string(),
            forwarding,
        });

        if revisited {
            return Err(ResolveErrorKind::CircularDependency { path: self.path() });
        }
        Ok(())
    }

    #[must_use]
    pub(crate) fn contains(&self, injector: usize, name: &str) -> bool {
        self.stack
            .iter()
            .any(|frame| frame.injector == injector && frame.name == name)
    }

    /// Name whose provider requested the top frame.
    #[must_use]
    pub(crate) fn requester(&self) -> Option<&str> {
        let index = self.stack.len().checked_sub(2)?;
        self.stack.get(index).map(|frame| frame.name.as_str())
    }

    #[inline]
    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    #[must_use]
    pub(crate) fn path(&self) -> ResolutionPath {
        let last = self.stack.len().saturating_sub(1);
        self.stack
            .iter()
            .enumerate()
            .filter(|(index, frame)| !frame.forwarding || *index == last)
            .map(|(_, frame)| frame.name.clone())
            .collect()
    }

    /// Current path followed by `name`, for a name that was never pushed.
    #[must_use]
    pub(crate) fn path_with(&self, name: &str) -> ResolutionPath {
        let mut path = self.path();
        path.0.push(name.to_string());
        path
    }

    #[cfg(test)]
    #[inline]
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
