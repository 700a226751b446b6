//! Identity node integration.
//!
//! The node protects its REST API with short-lived bearer tokens signed by a
//! key the operator registers on the node. [`NodeTokenGenerator`] mints one per
//! forwarded request.

mod token;

pub use token::{NodeApiClaims, NodeTokenError, NodeTokenGenerator, NODE_TOKEN_TTL_SECONDS};
