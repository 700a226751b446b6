use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_OIDC_ENABLED: &str = "oidc-enabled";
pub const ARG_OIDC_ISSUER: &str = "oidc-issuer";
pub const ARG_OIDC_CLIENT_ID: &str = "oidc-client-id";
pub const ARG_OIDC_CLIENT_SECRET: &str = "oidc-client-secret";
pub const ARG_OIDC_SCOPE: &str = "oidc-scope";

/// OpenID Connect client settings, only present when login is enabled.
#[derive(Debug, Clone)]
pub struct OidcOptions {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub oidc: Option<OidcOptions>,
}

impl Options {
    /// Parse OIDC arguments from matches.
    ///
    /// # Errors
    /// Returns an error if OIDC is enabled but incompletely configured.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        if !matches.get_flag(ARG_OIDC_ENABLED) {
            return Ok(Self { oidc: None });
        }

        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id} (OIDC enabled)"))
        };

        let scopes: Vec<String> = matches
            .get_many::<String>(ARG_OIDC_SCOPE)
            .map(|values| values.map(|v| v.trim().to_string()).collect())
            .unwrap_or_default();
        if scopes.iter().any(String::is_empty) {
            return Err(anyhow::anyhow!("--{ARG_OIDC_SCOPE} cannot contain empty scopes"));
        }
        if !scopes.iter().any(|scope| scope == "openid") {
            return Err(anyhow::anyhow!("--{ARG_OIDC_SCOPE} must include openid"));
        }

        Ok(Self {
            oidc: Some(OidcOptions {
                issuer: read_required(ARG_OIDC_ISSUER)?,
                client_id: read_required(ARG_OIDC_CLIENT_ID)?,
                client_secret: SecretString::from(read_required(ARG_OIDC_CLIENT_SECRET)?),
                scopes,
            }),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OIDC_ENABLED)
                .long(ARG_OIDC_ENABLED)
                .help("Require OpenID Connect login for secured paths")
                .env("NODE_ADMIN_OIDC_ENABLED")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_OIDC_ISSUER)
                .long(ARG_OIDC_ISSUER)
                .help("OpenID Connect issuer URL, discovery is fetched from <issuer>/.well-known/openid-configuration")
                .env("NODE_ADMIN_OIDC_ISSUER"),
        )
        .arg(
            Arg::new(ARG_OIDC_CLIENT_ID)
                .long(ARG_OIDC_CLIENT_ID)
                .help("OAuth2 client id")
                .env("NODE_ADMIN_OIDC_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_OIDC_CLIENT_SECRET)
                .long(ARG_OIDC_CLIENT_SECRET)
                .help("OAuth2 client secret")
                .env("NODE_ADMIN_OIDC_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_OIDC_SCOPE)
                .long(ARG_OIDC_SCOPE)
                .help("Comma separated scopes requested at login")
                .env("NODE_ADMIN_OIDC_SCOPE")
                .value_delimiter(',')
                .default_value("openid,profile,email"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("node-admin"))
    }

    #[test]
    fn disabled_by_default() {
        temp_env::with_vars([("NODE_ADMIN_OIDC_ENABLED", None::<&str>)], || {
            let matches = command().get_matches_from(vec!["node-admin"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok_and(|options| options.oidc.is_none()));
        });
    }

    #[test]
    fn enabled_requires_client_settings() {
        temp_env::with_vars(
            [
                ("NODE_ADMIN_OIDC_ISSUER", None::<&str>),
                ("NODE_ADMIN_OIDC_CLIENT_ID", None::<&str>),
                ("NODE_ADMIN_OIDC_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let matches = command().get_matches_from(vec![
                    "node-admin",
                    "--oidc-enabled",
                    "--oidc-issuer",
                    "https://idp.example.org",
                    "--oidc-client-id",
                    "admin-ui",
                ]);
                let err = Options::parse(&matches).err().map(|e| e.to_string());
                assert_eq!(
                    err.as_deref(),
                    Some("missing required argument: --oidc-client-secret (OIDC enabled)")
                );
            },
        );
    }

    #[test]
    fn scope_must_include_openid() {
        let matches = command().get_matches_from(vec![
            "node-admin",
            "--oidc-enabled",
            "--oidc-issuer",
            "https://idp.example.org",
            "--oidc-client-id",
            "admin-ui",
            "--oidc-client-secret",
            "changeme",
            "--oidc-scope",
            "profile,email",
        ]);
        let err = Options::parse(&matches).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("--oidc-scope must include openid"));
    }

    #[test]
    fn enabled_from_env() {
        temp_env::with_vars(
            [
                ("NODE_ADMIN_OIDC_ENABLED", Some("true")),
                ("NODE_ADMIN_OIDC_ISSUER", Some("https://idp.example.org")),
                ("NODE_ADMIN_OIDC_CLIENT_ID", Some("admin-ui")),
                ("NODE_ADMIN_OIDC_CLIENT_SECRET", Some("changeme")),
                ("NODE_ADMIN_OIDC_SCOPE", Some("openid,email")),
            ],
            || {
                let matches = command().get_matches_from(vec!["node-admin"]);
                let oidc = Options::parse(&matches).ok().and_then(|options| options.oidc);
                assert!(oidc.is_some());
                if let Some(oidc) = oidc {
                    assert_eq!(oidc.issuer, "https://idp.example.org");
                    assert_eq!(oidc.client_id, "admin-ui");
                    assert_eq!(oidc.client_secret.expose_secret(), "changeme");
                    assert_eq!(oidc.scopes, vec!["openid", "email"]);
                }
            },
        );
    }
}
