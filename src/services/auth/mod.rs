pub mod bearer;
pub mod claims;
pub mod codec;
pub mod error;
pub mod issuer;
pub mod service;

pub use claims::Claims;
pub use codec::{CodecError, SigningAlgorithm, TokenCodec};
pub use error::AuthError;
pub use issuer::{ClaimsHook, IssuedToken, TokenIssuer};
pub use service::{AuthService, Dispatch, GuardedRequest, IdentityResolution};
