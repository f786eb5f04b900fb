use alloc::{
    borrow::Cow,
    string::String,
    vec::Vec,
};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};
use tracing::debug;

use crate::{
    annotation::{Annotator, CallableInfo, Dependencies},
    arguments::{Arguments, FromArgument},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instance::Instance,
    service::{service_fn, RcService},
    utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety},
};

/// A function whose parameters are extracted from resolved [`Arguments`].
///
/// Implemented for closures and functions of up to 12 parameters, each implementing [`FromArgument`],
/// returning `Result<R, E>`.
pub trait Function<Args>: SendSafety + SyncSafety + 'static {
    type Output: SendSafety + SyncSafety + 'static;
    type Error: Into<InstantiateErrorKind>;

    const ARITY: usize;

    /// # Errors
    /// Returns an error if an argument can't be extracted or the function itself fails.
    fn call(&self, arguments: &Arguments) -> Result<Self::Output, InstantiateErrorKind>;
}

macro_rules! impl_function {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, Err, $($ty,)*> Function<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<R, Err> + SendSafety + SyncSafety + 'static,
            R: SendSafety + SyncSafety + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: FromArgument, )*
        {
            type Output = R;
            type Error = Err;

            const ARITY: usize = <[&str]>::len(&[$(stringify!($ty)),*]);

            fn call(&self, arguments: &Arguments) -> Result<Self::Output, InstantiateErrorKind> {
                let mut arguments = arguments.iter();
                $( let $ty = $ty::from_argument(arguments.next())?; )*
                self($($ty,)*).map_err(Into::into)
            }
        }
    };
}

all_the_tuples!(impl_function);

/// A function together with the names of the services it depends on.
///
/// Used as a factory, a constructor, an initializer or an ad-hoc target of [`crate::Injector::invoke`].
#[derive(Clone)]
pub struct Callable {
    service: RcService<Arguments, Result<Instance, InstantiateErrorKind>>,
    dependencies: Option<Dependencies>,
    scope: Vec<String>,
    info: CallableInfo,
}

impl Callable {
    /// Wraps a typed function without declared dependencies.
    ///
    /// Zero-parameter functions need none, others need [`Self::inject`] or an [`Annotator`].
    /// Returning an [`Instance`] hands that instance back as is.
    #[must_use]
    pub fn new<F, Args>(function: F) -> Self
    where
        F: Function<Args, Error = InstantiateErrorKind>,
    {
        Self {
            service: RcThreadSafety::new(service_fn(move |arguments: Arguments| -> Result<Instance, InstantiateErrorKind> {
                let instance = function.call(&arguments).map(Instance::new)?;
                debug!("Called");
                Ok(instance)
            })),
            dependencies: None,
            scope: Vec::new(),
            info: CallableInfo {
                type_name: type_name::<F>(),
                arity: F::ARITY,
            },
        }
    }

    /// Wraps a function reading [`Arguments`] directly.
    /// It depends on nothing until [`Self::inject`] is called.
    #[must_use]
    pub fn raw<F>(function: F) -> Self
    where
        F: Fn(Arguments) -> Result<Instance, InstantiateErrorKind> + SendSafety + SyncSafety + 'static,
    {
        Self {
            service: RcThreadSafety::new(service_fn(function)),
            dependencies: Some(Dependencies::Positional(Vec::new())),
            scope: Vec::new(),
            info: CallableInfo {
                type_name: type_name::<F>(),
                arity: 1,
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

    /// Attaches scope tags, forcing one of them in [`crate::Injector::create_child`] forces this provider too.
    #[must_use]
    pub fn scope<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.extend(tags.into_iter().map(Into::<String>::into));
        self
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> Option<&Dependencies> {
        self.dependencies.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn scope_tags(&self) -> &[String] {
        &self.scope
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> CallableInfo {
        self.info
    }

    /// Declared dependencies, else inferred by `annotator`, else none for zero-parameter functions.
    pub(crate) fn resolve_dependencies(&self, annotator: Option<&dyn Annotator>) -> Result<Cow<'_, Dependencies>, ResolveErrorKind> {
        if let Some(dependencies) = &self.dependencies {
            return Ok(Cow::Borrowed(dependencies));
        }
        if let Some(dependencies) = annotator.and_then(|annotator| annotator.annotate(&self.info)) {
            debug!(callable = self.info.type_name, "Dependencies inferred");
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
    pub(crate) fn call(&self, arguments: Arguments) -> Result<Instance, InstantiateErrorKind> {
        self.service.call(arguments)
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("type_name", &self.info.type_name)
            .field("dependencies", &self.dependencies)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Declares dependency names and a function in one call.
///
/// ```ignore
/// let car = annotate(["engine", "wheels"], |engine: Arc<Engine>, wheels: Arc<Wheels>| Ok(Car::new(engine, wheels)));
/// ```
#[must_use]
pub fn annotate<I, S, F, Args>(names: I, function: F) -> Callable
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Function<Args, Error = InstantiateErrorKind>,
{
    Callable::new(function).inject(names)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{annotate, Callable, Function};
    use crate::{
        annotation::{CallableInfo, Dependencies, StaticAnnotator},
        arguments::Arguments,
        errors::{InstantiateErrorKind, ResolveErrorKind},
        instance::Instance,
        utils::thread_safety::RcThreadSafety,
    };

    use alloc::{format, string::{String, ToString as _}, vec};
    use tracing_test::traced_test;

    fn double(value: RcThreadSafety<u32>) -> Result<u32, InstantiateErrorKind> {
        Ok(*value * 2)
    }

    fn arity<F: Function<Args>, Args>(_: &F) -> usize {
        F::ARITY
    }

    fn type_name_of<F>(_: &F) -> &'static str {
        core::any::type_name::<F>()
    }

    #[test]
    #[traced_test]
    fn test_arity() {
        assert_eq!(arity(&|| Ok::<_, InstantiateErrorKind>(())), 0);
        assert_eq!(arity(&double), 1);
        assert_eq!(
            arity(&|_: Instance, _: Option<Instance>, _: RcThreadSafety<u8>| Ok::<_, InstantiateErrorKind>(())),
            3
        );
    }

    #[test]
    #[traced_test]
    fn test_call() {
        let callable = annotate(["value"], double);
        let arguments = Arguments::positional(None, vec![(String::from("value"), Some(Instance::new(21_u32)))]);

        let instance = callable.call(arguments).unwrap();
        assert_eq!(*instance.downcast::<u32>().unwrap(), 42);
        assert_eq!(callable.dependencies(), Some(&Dependencies::parse(["value"])));
    }

    #[test]
    #[traced_test]
    fn test_returned_instance_is_kept() {
        let existing = Instance::new(1_u8);
        let callable = Callable::new({
            let existing = existing.clone();
            move || Ok(existing.clone())
        });

        let instance = callable.call(Arguments::default()).unwrap();
        assert!(instance.ptr_eq(&existing));
    }

    #[test]
    #[traced_test]
    fn test_resolve_dependencies() {
        let zero = Callable::new(|| Ok(1_u8));
        assert_eq!(zero.resolve_dependencies(None).unwrap().names().len(), 0);

        let undeclared = Callable::new(double);
        assert!(matches!(
            undeclared.resolve_dependencies(None),
            Err(ResolveErrorKind::InvalidCallable { .. })
        ));

        let annotator = StaticAnnotator::new().register(&double, ["value"]);
        assert_eq!(
            *undeclared.resolve_dependencies(Some(&annotator)).unwrap(),
            Dependencies::parse(["value"])
        );
        assert_eq!(
            undeclared.annotated(Some(&annotator)).dependencies(),
            Some(&Dependencies::parse(["value"]))
        );
        assert_eq!(
            undeclared.info(),
            CallableInfo {
                type_name: type_name_of(&double),
                arity: 1,
            }
        );
    }

    #[test]
    #[traced_test]
    fn test_scope_tags() {
        let callable = Callable::new(|| Ok(1_u8)).scope(["request"]).scope(["session"]);

        assert_eq!(callable.scope_tags(), ["request", "session"]);
    }
}
