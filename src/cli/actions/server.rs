use crate::{
    api::{
        self,
        handlers::{
            auth::{AuthConfig, AuthState},
            proxy::{Allowlist, Forwarder, ProxyState},
        },
        AppState, RouterOptions,
    },
    cli::commands::{node::NodeAuthOptions, oidc::OidcOptions},
    node::NodeTokenGenerator,
};
use anyhow::{anyhow, Context, Result};
use std::{fmt, fs, path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

pub struct Args {
    pub port: u16,
    pub url: Option<String>,
    pub secured_paths: Vec<String>,
    pub session_ttl_seconds: u64,
    pub upstream_timeout_seconds: u64,
    pub assets_dir: Option<String>,
    pub access_logs: bool,
    pub node_address: String,
    pub node_auth: Option<NodeAuthOptions>,
    pub oidc: Option<OidcOptions>,
}

// Secrets and key material never reach the logs.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("url", &self.url)
            .field("secured_paths", &self.secured_paths)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field("assets_dir", &self.assets_dir)
            .field("access_logs", &self.access_logs)
            .field("node_address", &self.node_address)
            .field(
                "node_auth",
                &self.node_auth.as_ref().map(|auth| {
                    format!(
                        "user={} audience={} algorithm={} keyfile=***",
                        auth.user, auth.audience, auth.algorithm
                    )
                }),
            )
            .field(
                "oidc",
                &self.oidc.as_ref().map(|oidc| {
                    format!(
                        "issuer={} client_id={} client_secret=*** scopes={}",
                        oidc.issuer,
                        oidc.client_id,
                        oidc.scopes.join(",")
                    )
                }),
            )
            .finish()
    }
}

fn node_token_generator(auth: &NodeAuthOptions) -> Result<NodeTokenGenerator> {
    let pem = fs::read(&auth.keyfile)
        .with_context(|| format!("Failed to read node auth key file: {}", auth.keyfile))?;
    NodeTokenGenerator::from_pem(&pem, &auth.algorithm, &auth.user, &auth.audience)
        .context("Invalid node auth key")
}

fn auth_state(args: &Args, timeout: Duration) -> Result<Option<Arc<AuthState>>> {
    let Some(oidc) = &args.oidc else {
        return Ok(None);
    };

    let base_url = args
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("application URL is required when OIDC is enabled"))?;
    let base_url = Url::parse(base_url).context("invalid application URL")?;

    let config = AuthConfig::new(
        oidc.issuer.clone(),
        oidc.client_id.clone(),
        oidc.client_secret.clone(),
        base_url,
    )
    .with_scopes(oidc.scopes.clone())
    .with_secured_paths(args.secured_paths.clone())
    .with_session_ttl(Duration::from_secs(args.session_ttl_seconds))
    .with_http_timeout(timeout);

    Ok(Some(Arc::new(AuthState::new(config)?)))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is inconsistent, the node key cannot be loaded,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    info!("Server args: {:?}", args);

    let timeout = Duration::from_secs(args.upstream_timeout_seconds);

    let tokens = match &args.node_auth {
        Some(auth) => {
            info!("Node API security enabled for user {}", auth.user);
            Some(Arc::new(node_token_generator(auth)?))
        }
        None => {
            info!("Node API security disabled");
            None
        }
    };

    let node_address = Url::parse(&args.node_address).context("invalid node address")?;
    let forwarder = Forwarder::new(node_address, tokens, timeout)?;
    let proxy = ProxyState::new(Allowlist::default_routes()?, forwarder);

    let auth = auth_state(&args, timeout)?;
    if auth.is_none() {
        warn!("OIDC login disabled, secured paths are open");
    }

    let options = RouterOptions {
        assets_dir: args.assets_dir.map(PathBuf::from),
        access_logs: args.access_logs,
    };

    api::new(
        args.port,
        AppState {
            auth,
            proxy: Arc::new(proxy),
        },
        options,
    )
    .await
}
