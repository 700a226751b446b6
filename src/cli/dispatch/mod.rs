//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the server action and its configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{self, node, oidc};
use anyhow::{anyhow, Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(1305);

    let url = matches
        .get_one::<String>(commands::ARG_URL)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let secured_paths: Vec<String> = matches
        .get_many::<String>(commands::ARG_SECURED_PATHS)
        .map(|values| {
            values
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if let Some(path) = secured_paths.iter().find(|path| !path.starts_with('/')) {
        return Err(anyhow!(
            "--{} entries must start with '/', got: {path}",
            commands::ARG_SECURED_PATHS
        ));
    }

    let node_opts = node::Options::parse(matches)?;
    Url::parse(&node_opts.address).context("invalid --node-address")?;

    let oidc_opts = oidc::Options::parse(matches)?;
    if let Some(oidc) = &oidc_opts.oidc {
        Url::parse(&oidc.issuer).context("invalid --oidc-issuer")?;

        let base = url.as_deref().ok_or_else(|| {
            anyhow!("missing required argument: --{} (OIDC enabled)", commands::ARG_URL)
        })?;
        let base = Url::parse(base).context("invalid --url")?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("--{} must be an http(s) URL", commands::ARG_URL));
        }
    }

    Ok(Action::Server(Args {
        port,
        url,
        secured_paths,
        session_ttl_seconds: matches
            .get_one::<u64>(commands::ARG_SESSION_TTL)
            .copied()
            .unwrap_or(900),
        upstream_timeout_seconds: matches
            .get_one::<u64>(commands::ARG_UPSTREAM_TIMEOUT)
            .copied()
            .unwrap_or(30),
        assets_dir: matches.get_one::<String>(commands::ARG_ASSETS_DIR).cloned(),
        access_logs: matches
            .get_one::<bool>(commands::ARG_ACCESS_LOGS)
            .copied()
            .unwrap_or(true),
        node_address: node_opts.address,
        node_auth: node_opts.auth,
        oidc: oidc_opts.oidc,
    }))
}
