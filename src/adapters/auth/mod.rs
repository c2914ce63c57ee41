//! Credential refresh integration
//!
//! Assertion signing and the token endpoint client used to renew expiring
//! bearer credentials.

pub mod signer;
pub mod token_endpoint;

pub use signer::{assertion_payload, AssertionSigner, PemSigner};
pub use token_endpoint::{TokenEndpointClient, TokenExchange};
