use alloc::format;
use tracing::{debug, error, info_span};

use crate::{errors::InitErrorKind, injector::Injector, module::Initializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
}

#[derive(Clone)]
pub(crate) enum InitTarget {
    Local,
    /// Private module's injector, the step runs there.
    Private(Injector),
}

#[derive(Clone)]
enum InitKind {
    Run(Initializer),
    /// Runs the private injector's own sequence before the boundary's initializers.
    PrivateInit,
}

#[derive(Clone)]
pub(crate) struct InitStep {
    target: InitTarget,
    kind: InitKind,
}

impl InitStep {
    #[inline]
    #[must_use]
    pub(crate) const fn new(target: InitTarget, initializer: Initializer) -> Self {
        Self {
            target,
            kind: InitKind::Run(initializer),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn private_init(private: Injector) -> Self {
        Self {
            target: InitTarget::Private(private),
            kind: InitKind::PrivateInit,
        }
    }
}

impl Injector {
    /// Runs initializers of the loaded modules once, `depends` before dependents.
    ///
    /// Later calls do nothing, also after a failure and when called from an initializer.
    ///
    /// # Errors
    /// Returns [`InitErrorKind::Failed`] with the first failing step, the remaining steps are skipped.
    pub fn init(&self) -> Result<(), InitErrorKind> {
        let span = info_span!("init", steps = self.inner.initializers.len());
        let _guard = span.enter();

        {
            let mut state = self.inner.state.lock();
            if *state != InitState::Uninitialized {
                debug!(state = ?*state, "Init skipped");
                return Ok(());
            }
            *state = InitState::Initializing;
        }

        let result = self.run_initializers();
        *self.inner.state.lock() = InitState::Initialized;

        match &result {
            Ok(()) => debug!("Initialized"),
            Err(err) => error!("{}", err),
        }
        result
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        *self.inner.state.lock() == InitState::Initialized
    }

    fn run_initializers(&self) -> Result<(), InitErrorKind> {
        for (index, step) in self.inner.initializers.iter().enumerate() {
            let injector = match &step.target {
                InitTarget::Local => self,
                InitTarget::Private(private) => private,
            };

            match &step.kind {
                InitKind::PrivateInit => injector.init().map_err(InitErrorKind::within_private)?,
                InitKind::Run(Initializer::Service(name)) => {
                    injector
                        .get(name)
                        .map_err(|err| InitErrorKind::failed(format!("service \"{name}\""), err))?;
                }
                InitKind::Run(Initializer::Callable(callable)) => {
                    injector.invoke(callable).map_err(|err| {
                        InitErrorKind::failed(format!("initializer #{index} ({})", callable.info().type_name), err)
                    })?;
                }
            }
        }
        Ok(())
    }
}
