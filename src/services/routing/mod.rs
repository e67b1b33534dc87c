pub mod endpoint;
pub mod registry;
pub mod spec;

pub use endpoint::{Endpoint, EndpointError};
pub use registry::{EndpointInput, RouteGuards, RouteGuardsBuilder, parse_bindings};
pub use spec::{RegistryError, StepInput, StepSpec};
