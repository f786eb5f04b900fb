use crate::{annotation::Annotator, utils::thread_safety::RcThreadSafety};

/// Config of an injector, inherited by its child and private injectors.
/// ## Fields
/// - `separator`:
///   Splits a service name into a head service and a path of properties, e.g. `config.port`.
///   A name with a direct provider is never split.
/// - `annotator`:
///   Infers dependency names of callables that don't declare them.
#[derive(Clone)]
pub struct Config {
    pub separator: char,
    pub annotator: Option<RcThreadSafety<dyn Annotator>>,
}

impl Config {
    #[inline]
    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_annotator<A: Annotator + 'static>(mut self, annotator: A) -> Self {
        self.annotator = Some(RcThreadSafety::new(annotator));
        self
    }

    #[inline]
    #[must_use]
    pub(crate) fn annotator(&self) -> Option<&dyn Annotator> {
        self.annotator.as_deref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: '.',
            annotator: None,
        }
    }
}
