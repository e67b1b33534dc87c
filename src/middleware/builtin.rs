//! The `role` and `can` steps.

use tracing::debug;

use crate::middleware::pipeline::{BoxFuture, Middleware, Next, Outcome};
use crate::services::identity::Principal;

fn deny<P: Send + 'static>() -> BoxFuture<'static, Outcome<P>> {
    Box::pin(async { Outcome::Deny })
}

/// Passes when the current subject holds one of the roles in `params`.
///
/// An empty role list lets any authenticated subject through.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleMiddleware;

impl<P> Middleware<P> for RoleMiddleware
where
    P: Principal + Send + 'static,
{
    fn handle(&self, payload: P, roles: &[String], next: Next<P>) -> BoxFuture<'static, Outcome<P>> {
        let allowed = match payload.principal() {
            Some(subject) => roles.is_empty() || subject.has_any_role(roles),
            None => false,
        };

        if !allowed {
            debug!(?roles, "role check failed");
            return deny();
        }
        next.run(payload)
    }
}

/// Passes when the current subject has the capability in `params[0]`,
/// checked against the remaining params.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityMiddleware;

impl<P> Middleware<P> for CapabilityMiddleware
where
    P: Principal + Send + 'static,
{
    fn handle(&self, payload: P, params: &[String], next: Next<P>) -> BoxFuture<'static, Outcome<P>> {
        let Some((capability, args)) = params.split_first() else {
            debug!("capability step without a capability");
            return deny();
        };

        let allowed = payload
            .principal()
            .is_some_and(|subject| subject.can(capability, args));

        if !allowed {
            debug!(capability = %capability, ?args, "capability check failed");
            return deny();
        }
        next.run(payload)
    }
}
