//! Identity provider clients
//!
//! Discovery of the provider's endpoints, the two token exchanges used by
//! the dashboard flow, and decoding of the resulting access token.

mod claims;
mod discovery;
mod token;
mod transport;

pub use claims::AccessTokenClaims;
pub use discovery::{IdentityConfiguration, IdentityDiscovery};
pub use token::TokenExchangeClient;
pub use transport::UpstreamClient;
