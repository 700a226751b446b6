use clap::{Arg, ArgMatches, Command};

pub const ARG_NODE_ADDRESS: &str = "node-address";
pub const ARG_NODE_AUTH_KEYFILE: &str = "node-auth-keyfile";
pub const ARG_NODE_AUTH_USER: &str = "node-auth-user";
pub const ARG_NODE_AUTH_AUDIENCE: &str = "node-auth-audience";
pub const ARG_NODE_AUTH_ALGORITHM: &str = "node-auth-algorithm";

/// Node API security settings, only present when a key file is configured.
#[derive(Debug, Clone)]
pub struct NodeAuthOptions {
    pub keyfile: String,
    pub user: String,
    pub audience: String,
    pub algorithm: String,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub address: String,
    pub auth: Option<NodeAuthOptions>,
}

impl Options {
    /// Parse node arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a key file is configured without user and audience.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let address = read(ARG_NODE_ADDRESS)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_NODE_ADDRESS}"))?;

        let auth = match read(ARG_NODE_AUTH_KEYFILE) {
            Some(keyfile) => Some(NodeAuthOptions {
                keyfile,
                user: read(ARG_NODE_AUTH_USER).ok_or_else(|| {
                    anyhow::anyhow!("--{ARG_NODE_AUTH_USER} is required with --{ARG_NODE_AUTH_KEYFILE}")
                })?,
                audience: read(ARG_NODE_AUTH_AUDIENCE).ok_or_else(|| {
                    anyhow::anyhow!(
                        "--{ARG_NODE_AUTH_AUDIENCE} is required with --{ARG_NODE_AUTH_KEYFILE}"
                    )
                })?,
                algorithm: read(ARG_NODE_AUTH_ALGORITHM).unwrap_or_else(|| "ES256".to_string()),
            }),
            None => None,
        };

        Ok(Self { address, auth })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_NODE_ADDRESS)
                .long(ARG_NODE_ADDRESS)
                .help("Base URL of the node REST API")
                .env("NODE_ADMIN_NODE_ADDRESS")
                .default_value("http://localhost:8081"),
        )
        .arg(
            Arg::new(ARG_NODE_AUTH_KEYFILE)
                .long(ARG_NODE_AUTH_KEYFILE)
                .help("PEM private key used to sign node API tokens; API security is off when unset")
                .env("NODE_ADMIN_NODE_AUTH_KEYFILE"),
        )
        .arg(
            Arg::new(ARG_NODE_AUTH_USER)
                .long(ARG_NODE_AUTH_USER)
                .help("Issuer of node API tokens, must match the node's authorized key user")
                .env("NODE_ADMIN_NODE_AUTH_USER"),
        )
        .arg(
            Arg::new(ARG_NODE_AUTH_AUDIENCE)
                .long(ARG_NODE_AUTH_AUDIENCE)
                .help("Audience of node API tokens")
                .env("NODE_ADMIN_NODE_AUTH_AUDIENCE"),
        )
        .arg(
            Arg::new(ARG_NODE_AUTH_ALGORITHM)
                .long(ARG_NODE_AUTH_ALGORITHM)
                .help("Signing algorithm for node API tokens")
                .env("NODE_ADMIN_NODE_AUTH_ALGORITHM")
                .value_parser(["ES256", "ES384", "PS256", "PS384", "PS512", "RS256"])
                .default_value("ES256"),
        )
}
