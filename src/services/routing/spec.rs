//! Middleware step specifiers.
//!
//! The string form is `name` or `name:arg1,arg2`. `role` and `can` are
//! built in; any other name refers to a handler registered on the
//! [`RouteGuardsBuilder`](super::registry::RouteGuardsBuilder).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::middleware::pipeline::Handler;
use crate::services::routing::endpoint::EndpointError;

pub const ROLE: &str = "role";
pub const CAN: &str = "can";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("empty middleware spec")]
    EmptySpec,
    #[error("`{0}` needs a capability, e.g. `can:edit_posts`")]
    MissingCapability(String),
    #[error("unknown middleware `{0}`")]
    UnknownMiddleware(String),
    #[error("`{0}` is a built-in middleware name")]
    ReservedName(String),
    #[error("malformed middleware binding `{0}`, expected `pattern=spec|spec`")]
    MalformedBinding(String),
}

/// A parsed step, resolved into a pipeline step when the registry is built.
pub enum StepSpec<P> {
    Role(BTreeSet<String>),
    Capability { name: String, args: Vec<String> },
    Named { name: String, params: Vec<String> },
    Custom(Handler<P>),
}

impl<P> fmt::Debug for StepSpec<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSpec::Role(roles) => f.debug_tuple("Role").field(roles).finish(),
            StepSpec::Capability { name, args } => f
                .debug_struct("Capability")
                .field("name", name)
                .field("args", args)
                .finish(),
            StepSpec::Named { name, params } => f
                .debug_struct("Named")
                .field("name", name)
                .field("params", params)
                .finish(),
            StepSpec::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<P> FromStr for StepSpec<P> {
    type Err = RegistryError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (name, args) = spec.split_once(':').unwrap_or((spec, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptySpec);
        }

        let mut args: Vec<String> = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        Ok(match name {
            ROLE => StepSpec::Role(args.into_iter().collect()),
            CAN => {
                if args.is_empty() {
                    return Err(RegistryError::MissingCapability(spec.to_string()));
                }
                let capability = args.remove(0);
                StepSpec::Capability {
                    name: capability,
                    args,
                }
            }
            _ => StepSpec::Named {
                name: name.to_string(),
                params: args,
            },
        })
    }
}

/// What callers hand to the builder: a spec string or a ready spec.
pub enum StepInput<P> {
    Raw(String),
    Spec(StepSpec<P>),
}

impl<P> StepInput<P> {
    pub(crate) fn into_spec(self) -> Result<StepSpec<P>, RegistryError> {
        match self {
            StepInput::Raw(raw) => raw.parse(),
            StepInput::Spec(spec) => Ok(spec),
        }
    }
}

impl<P> From<&str> for StepInput<P> {
    fn from(raw: &str) -> Self {
        StepInput::Raw(raw.to_string())
    }
}

impl<P> From<String> for StepInput<P> {
    fn from(raw: String) -> Self {
        StepInput::Raw(raw)
    }
}

impl<P> From<StepSpec<P>> for StepInput<P> {
    fn from(spec: StepSpec<P>) -> Self {
        StepInput::Spec(spec)
    }
}

impl<P> From<Handler<P>> for StepInput<P> {
    fn from(handler: Handler<P>) -> Self {
        StepInput::Spec(StepSpec::Custom(handler))
    }
}
