//! Route guard registry: which paths are ignored, which are guarded, and
//! which middleware chain applies to a path.
//!
//! Built once at startup with [`RouteGuardsBuilder`] and read-only
//! afterwards, so request handling shares it without locking.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::middleware::builtin::{CapabilityMiddleware, RoleMiddleware};
use crate::middleware::pipeline::{Handler, Step};
use crate::services::identity::Principal;
use crate::services::routing::endpoint::{Endpoint, matches_any};
use crate::services::routing::spec::{CAN, ROLE, RegistryError, StepInput, StepSpec};

/// A pattern string or an endpoint with its own matcher.
pub enum EndpointInput {
    Pattern(String),
    Endpoint(Endpoint),
}

impl EndpointInput {
    fn compile(self) -> Result<Endpoint, RegistryError> {
        match self {
            EndpointInput::Pattern(p) => Ok(Endpoint::compile(&p)?),
            EndpointInput::Endpoint(e) => Ok(e),
        }
    }
}

impl From<&str> for EndpointInput {
    fn from(p: &str) -> Self {
        EndpointInput::Pattern(p.to_string())
    }
}

impl From<String> for EndpointInput {
    fn from(p: String) -> Self {
        EndpointInput::Pattern(p)
    }
}

impl From<&String> for EndpointInput {
    fn from(p: &String) -> Self {
        EndpointInput::Pattern(p.clone())
    }
}

impl From<Endpoint> for EndpointInput {
    fn from(e: Endpoint) -> Self {
        EndpointInput::Endpoint(e)
    }
}

/// An endpoint and the steps bound to it.
pub struct MiddlewareBinding<P> {
    pub endpoint: Endpoint,
    pub steps: Vec<Step<P>>,
}

pub struct RouteGuards<P> {
    guards: Vec<Endpoint>,
    ignores: Vec<Endpoint>,
    bindings: Vec<MiddlewareBinding<P>>,
}

impl<P> fmt::Debug for RouteGuards<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns = |rules: &[Endpoint]| -> Vec<String> {
            rules.iter().map(|e| e.pattern().to_string()).collect()
        };
        f.debug_struct("RouteGuards")
            .field("guards", &patterns(&self.guards))
            .field("ignores", &patterns(&self.ignores))
            .field(
                "bindings",
                &self
                    .bindings
                    .iter()
                    .map(|b| (b.endpoint.pattern(), b.steps.len()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<P> Default for RouteGuards<P> {
    fn default() -> Self {
        Self {
            guards: Vec::new(),
            ignores: Vec::new(),
            bindings: Vec::new(),
        }
    }
}

impl<P: Principal + Send + 'static> RouteGuards<P> {
    pub fn builder() -> RouteGuardsBuilder<P> {
        RouteGuardsBuilder::default()
    }
}

impl<P> RouteGuards<P> {
    pub fn should_be_ignored(&self, path: &str) -> bool {
        matches_any(path, &self.ignores)
    }

    pub fn should_be_guarded(&self, path: &str) -> bool {
        matches_any(path, &self.guards)
    }

    /// Steps of every binding matching `path`, concatenated in registration order.
    pub fn middlewares_for(&self, path: &str) -> Vec<Step<P>> {
        self.bindings
            .iter()
            .filter(|b| b.endpoint.is_match(path))
            .flat_map(|b| b.steps.iter().cloned())
            .collect()
    }
}

pub struct RouteGuardsBuilder<P> {
    guards: Vec<EndpointInput>,
    ignores: Vec<EndpointInput>,
    bindings: Vec<(EndpointInput, Vec<StepInput<P>>)>,
    handlers: HashMap<String, Handler<P>>,
}

impl<P> Default for RouteGuardsBuilder<P> {
    fn default() -> Self {
        Self {
            guards: Vec::new(),
            ignores: Vec::new(),
            bindings: Vec::new(),
            handlers: HashMap::new(),
        }
    }
}

impl<P: Principal + Send + 'static> RouteGuardsBuilder<P> {
    pub fn guard<I, E>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointInput>,
    {
        self.guards.extend(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn ignore<I, E>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointInput>,
    {
        self.ignores.extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// Bind steps to an endpoint. Repeating a pattern adds another binding.
    pub fn middleware<E, I, S>(mut self, endpoint: E, steps: I) -> Self
    where
        E: Into<EndpointInput>,
        I: IntoIterator<Item = S>,
        S: Into<StepInput<P>>,
    {
        self.bindings.push((
            endpoint.into(),
            steps.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Make `name` usable in spec strings (`name:arg1,arg2`).
    pub fn register_handler(mut self, name: impl Into<String>, handler: Handler<P>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn build(self) -> Result<RouteGuards<P>, RegistryError> {
        if let Some(name) = [ROLE, CAN]
            .into_iter()
            .find(|n| self.handlers.contains_key(*n))
        {
            return Err(RegistryError::ReservedName(name.to_string()));
        }

        let guards = compile_all(self.guards)?;
        let ignores = compile_all(self.ignores)?;

        let role = Handler::shared(RoleMiddleware);
        let can = Handler::shared(CapabilityMiddleware);

        let mut bindings = Vec::with_capacity(self.bindings.len());
        for (endpoint, inputs) in self.bindings {
            let endpoint = endpoint.compile()?;
            let mut steps = Vec::with_capacity(inputs.len());

            for input in inputs {
                let step = match input.into_spec()? {
                    StepSpec::Role(roles) => Step::new(role.clone(), roles),
                    StepSpec::Capability { name, args } => {
                        Step::new(can.clone(), std::iter::once(name).chain(args))
                    }
                    StepSpec::Named { name, params } => {
                        let handler = self
                            .handlers
                            .get(&name)
                            .cloned()
                            .ok_or(RegistryError::UnknownMiddleware(name))?;
                        Step::new(handler, params)
                    }
                    StepSpec::Custom(handler) => Step::new(handler, Vec::<String>::new()),
                };
                steps.push(step);
            }

            debug!(pattern = endpoint.pattern(), steps = steps.len(), "middleware bound");
            bindings.push(MiddlewareBinding { endpoint, steps });
        }

        Ok(RouteGuards {
            guards,
            ignores,
            bindings,
        })
    }
}

fn compile_all(inputs: Vec<EndpointInput>) -> Result<Vec<Endpoint>, RegistryError> {
    inputs.into_iter().map(EndpointInput::compile).collect()
}

/// Parse `pattern=spec|spec;pattern=spec` into bindings.
pub fn parse_bindings(raw: &str) -> Result<Vec<(String, Vec<String>)>, RegistryError> {
    raw.split(';')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|binding| {
            let (pattern, specs) = binding
                .split_once('=')
                .ok_or_else(|| RegistryError::MalformedBinding(binding.to_string()))?;
            let specs: Vec<String> = specs
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if pattern.trim().is_empty() || specs.is_empty() {
                return Err(RegistryError::MalformedBinding(binding.to_string()));
            }
            Ok((pattern.trim().to_string(), specs))
        })
        .collect()
}
