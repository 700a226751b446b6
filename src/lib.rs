//! # node-admin
//!
//! Administrative gateway in front of an identity node. The browser UI talks to
//! this service; it either answers itself or forwards a curated subset of calls
//! to the node's REST API.
//!
//! ## Edge security
//!
//! - **Authentication gateway:** secured paths require a server-side session
//!   created by an OpenID Connect authorization-code login. Sessions expire
//!   server-side, independent of the cookie lifetime.
//! - **Proxy allowlist:** requests under `/api/proxy` are only forwarded when the
//!   (method, normalized path) pair matches a fixed allowlist. Everything else is
//!   answered with `403 Forbidden` and never reaches the node.
//!
//! ## Node API security
//!
//! When a signing key is configured, forwarded requests carry a short-lived JWT
//! bearer token signed with that key.

pub mod api;
pub mod cli;
pub mod node;

#[cfg(test)]
mod test_keys;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
