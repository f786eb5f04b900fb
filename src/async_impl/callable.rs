use alloc::{borrow::Cow, boxed::Box, string::String, vec::Vec};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    future::Future,
};
use tracing::debug;

use crate::{
    annotation::{Annotator, CallableInfo, Dependencies},
    arguments::{Arguments, FromArgument},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instance::Instance,
    service::{service_fn, RcService},
    utils::{
        future::BoxFuture,
        thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
    },
};

/// Async counterpart of [`crate::Function`], for functions returning a future of `Result<R, E>`.
pub trait AsyncFunction<Args>: SendSafety + SyncSafety + 'static {
    type Output: SendSafety + SyncSafety + 'static;
    type Error: Into<InstantiateErrorKind>;

    const ARITY: usize;

    fn call(&self, arguments: &Arguments) -> BoxFuture<'static, Result<Self::Output, InstantiateErrorKind>>;
}

macro_rules! impl_async_function {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, R, Err, $($ty,)*> AsyncFunction<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + SendSafety + SyncSafety + 'static,
            Fut: Future<Output = Result<R, Err>> + SendSafety + 'static,
            R: SendSafety + SyncSafety + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: FromArgument, )*
        {
            type Output = R;
            type Error = Err;

            const ARITY: usize = <[&str]>::len(&[$(stringify!($ty)),*]);

            fn call(&self, arguments: &Arguments) -> BoxFuture<'static, Result<Self::Output, InstantiateErrorKind>> {
                let mut arguments = arguments.iter();
                $(
                    let $ty = match $ty::from_argument(arguments.next()) {
                        Ok(argument) => argument,
                        Err(err) => return Box::pin(async move { Err::<R, InstantiateErrorKind>(err) }),
                    };
                )*
                let future = self($($ty,)*);
                Box::pin(async move { future.await.map_err(Into::<InstantiateErrorKind>::into) })
            }
        }
    };
}

all_the_tuples!(impl_async_function);

type AsyncResponse = BoxFuture<'static, Result<Instance, InstantiateErrorKind>>;

/// A suspending function together with the names of the services it depends on.
#[derive(Clone)]
pub struct AsyncCallable {
    service: RcService<Arguments, AsyncResponse>,
    dependencies: Option<Dependencies>,
    info: CallableInfo,
}

impl AsyncCallable {
    #[must_use]
    pub fn new<F, Args>(function: F) -> Self
    where
        F: AsyncFunction<Args, Error = InstantiateErrorKind>,
    {
        Self {
            service: RcThreadSafety::new(service_fn(move |arguments: Arguments| -> AsyncResponse {
                let future = function.call(&arguments);
                Box::pin(async move {
                    let result = future.await.map(Instance::new);
                    if result.is_ok() {
                        debug!("Called");
                    }
                    result
                })
            })),
            dependencies: None,
            info: CallableInfo {
                type_name: type_name::<F>(),
                arity: F::ARITY,
            },
        }
    }

    /// Declares dependency names, a leading [`crate::KEYED_MARKER`] switches to keyed arguments.
    #[must_use]
    pub fn inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(Dependencies::parse(names));
        self
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> Option<&Dependencies> {
        self.dependencies.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> CallableInfo {
        self.info
    }

    pub(crate) fn resolve_dependencies(&self, annotator: Option<&dyn Annotator>) -> Result<Cow<'_, Dependencies>, ResolveErrorKind> {
        if let Some(dependencies) = &self.dependencies {
            return Ok(Cow::Borrowed(dependencies));
        }
        if let Some(dependencies) = annotator.and_then(|annotator| annotator.annotate(&self.info)) {
            return Ok(Cow::Owned(dependencies));
        }
        if self.info.arity == 0 {
            return Ok(Cow::Owned(Dependencies::Positional(Vec::new())));
        }
        Err(ResolveErrorKind::InvalidCallable {
            callable: self.info.type_name,
        })
    }

    /// Copy with dependencies fixed up front, so the annotator isn't consulted per call.
    #[must_use]
    pub(crate) fn annotated(&self, annotator: Option<&dyn Annotator>) -> Self {
        match self.resolve_dependencies(annotator) {
            Ok(Cow::Owned(dependencies)) => Self {
                dependencies: Some(dependencies),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    #[inline]
    pub(crate) fn call(&self, arguments: Arguments) -> AsyncResponse {
        self.service.call(arguments)
    }
}

impl Debug for AsyncCallable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCallable")
            .field("type_name", &self.info.type_name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Declares dependency names and an async function in one call.
#[must_use]
pub fn annotate<I, S, F, Args>(names: I, function: F) -> AsyncCallable
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: AsyncFunction<Args, Error = InstantiateErrorKind>,
{
    AsyncCallable::new(function).inject(names)
}
