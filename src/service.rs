use crate::utils::thread_safety::{RcThreadSafety, SendSafety, SyncSafety};

/// Type-erased body of a callable.
///
/// The response is a `Result` for sync callables and a boxed future for async ones.
pub(crate) trait Service<Request>: SendSafety + SyncSafety {
    type Response;

    fn call(&self, request: Request) -> Self::Response;
}

pub(crate) struct FnService<F>(F);

impl<F, Request, Response> Service<Request> for FnService<F>
where
    F: Fn(Request) -> Response + SendSafety + SyncSafety,
{
    type Response = Response;

    #[inline]
    fn call(&self, request: Request) -> Self::Response {
        (self.0)(request)
    }
}

#[inline]
#[must_use]
pub(crate) const fn service_fn<F>(f: F) -> FnService<F> {
    FnService(f)
}

pub(crate) type RcService<Request, Response> = RcThreadSafety<dyn Service<Request, Response = Response>>;

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{service_fn, RcService, Service as _};
    use crate::utils::thread_safety::RcThreadSafety;

    use core::convert::Infallible;

    #[derive(Clone, Copy)]
    struct Request(bool);
    struct Response(bool);

    #[test]
    fn test_service_fn() {
        let service = service_fn(|Request(val)| Ok::<_, Infallible>(Response(val)));

        let request = Request(true);
        let response = service.call(request).unwrap();

        assert_eq!(request.0, response.0);
    }

    #[test]
    fn test_rc_service() {
        let service: RcService<u8, u16> = RcThreadSafety::new(service_fn(|value: u8| u16::from(value) * 2));

        assert_eq!(service.clone().call(4), 8);
    }
}
