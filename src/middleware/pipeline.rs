//! Composable middleware chain.
//!
//! A chain is an ordered list of [`Step`]s. The first step wraps every later
//! one: it receives the payload, its own parameters and a [`Next`] handle,
//! and either forwards the payload with `next.run(payload)` or stops the
//! chain by returning a terminal [`Outcome`]. Running past the last step
//! yields the payload unchanged.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::Response;

use crate::error::Rejection;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of running a payload through a chain.
pub enum Outcome<P> {
    /// Every step passed the payload on.
    Continue(P),
    /// A step refused the request.
    Deny,
    /// A step failed with a structured error.
    Fail(Rejection),
    /// A step produced the response itself.
    Respond(Response),
}

impl<P> Outcome<P> {
    pub fn is_continue(&self) -> bool {
        matches!(self, Outcome::Continue(_))
    }
}

/// One unit of the chain.
///
/// The returned future must not borrow `self` or `params`; copy what the
/// async part needs before building it.
pub trait Middleware<P>: Send + Sync {
    fn handle(&self, payload: P, params: &[String], next: Next<P>)
    -> BoxFuture<'static, Outcome<P>>;
}

struct FnMiddleware<F>(F);

impl<P, F> Middleware<P> for FnMiddleware<F>
where
    F: Fn(P, &[String], Next<P>) -> BoxFuture<'static, Outcome<P>> + Send + Sync,
{
    fn handle(
        &self,
        payload: P,
        params: &[String],
        next: Next<P>,
    ) -> BoxFuture<'static, Outcome<P>> {
        (self.0)(payload, params, next)
    }
}

type MiddlewareFactory<P> = dyn Fn() -> Box<dyn Middleware<P>> + Send + Sync;

/// How a step obtains its middleware.
pub enum Handler<P> {
    /// One instance shared by every invocation.
    Shared(Arc<dyn Middleware<P>>),
    /// A fresh instance per invocation.
    Factory(Arc<MiddlewareFactory<P>>),
}

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        match self {
            Handler::Shared(m) => Handler::Shared(Arc::clone(m)),
            Handler::Factory(f) => Handler::Factory(Arc::clone(f)),
        }
    }
}

impl<P: 'static> Handler<P> {
    pub fn shared<M>(middleware: M) -> Self
    where
        M: Middleware<P> + 'static,
    {
        Handler::Shared(Arc::new(middleware))
    }

    pub fn factory<F, M>(make: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware<P> + 'static,
    {
        Handler::Factory(Arc::new(move || Box::new(make()) as Box<dyn Middleware<P>>))
    }

    /// Wrap a plain function or closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(P, &[String], Next<P>) -> BoxFuture<'static, Outcome<P>> + Send + Sync + 'static,
    {
        Handler::Shared(Arc::new(FnMiddleware(f)))
    }

    fn invoke(&self, payload: P, params: &[String], next: Next<P>) -> BoxFuture<'static, Outcome<P>> {
        match self {
            Handler::Shared(m) => m.handle(payload, params, next),
            Handler::Factory(make) => make().handle(payload, params, next),
        }
    }
}

/// A handler bound to the parameters parsed from its spec.
pub struct Step<P> {
    pub handler: Handler<P>,
    pub params: Arc<[String]>,
}

impl<P> Clone for Step<P> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            params: Arc::clone(&self.params),
        }
    }
}

impl<P: 'static> Step<P> {
    pub fn new<I, S>(handler: Handler<P>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            handler,
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// The remainder of the chain, handed to each step.
pub struct Next<P> {
    steps: Arc<[Step<P>]>,
    cursor: usize,
}

impl<P: Send + 'static> Next<P> {
    pub fn run(self, payload: P) -> BoxFuture<'static, Outcome<P>> {
        let Some(step) = self.steps.get(self.cursor) else {
            return Box::pin(async move { Outcome::Continue(payload) });
        };

        let rest = Next {
            steps: Arc::clone(&self.steps),
            cursor: self.cursor + 1,
        };
        step.handler.invoke(payload, &step.params, rest)
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Send `payload` through `steps`, first to last.
    pub async fn through<P>(payload: P, steps: impl Into<Arc<[Step<P>]>>) -> Outcome<P>
    where
        P: Send + 'static,
    {
        Next {
            steps: steps.into(),
            cursor: 0,
        }
        .run(payload)
        .await
    }
}
