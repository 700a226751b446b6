pub mod logging;
pub mod node;
pub mod oidc;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_URL: &str = "url";
pub const ARG_SECURED_PATHS: &str = "secured-paths";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_UPSTREAM_TIMEOUT: &str = "upstream-timeout";
pub const ARG_ASSETS_DIR: &str = "assets-dir";
pub const ARG_ACCESS_LOGS: &str = "access-logs";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("node-admin")
        .about("Administrative gateway for identity nodes")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("1305")
                .env("NODE_ADMIN_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_URL)
                .long(ARG_URL)
                .help("Public base URL of this application, example: https://admin.example.org")
                .env("NODE_ADMIN_URL"),
        )
        .arg(
            Arg::new(ARG_SECURED_PATHS)
                .long(ARG_SECURED_PATHS)
                .help("Comma separated path prefixes that require login; '/' secures the root path only")
                .env("NODE_ADMIN_SECURED_PATHS")
                .value_delimiter(',')
                .default_value("/,/api"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .env("NODE_ADMIN_SESSION_TTL")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_UPSTREAM_TIMEOUT)
                .long(ARG_UPSTREAM_TIMEOUT)
                .help("Timeout in seconds for calls to the identity provider and the node")
                .env("NODE_ADMIN_UPSTREAM_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ASSETS_DIR)
                .long(ARG_ASSETS_DIR)
                .help("Directory with the web UI assets")
                .env("NODE_ADMIN_ASSETS_DIR"),
        )
        .arg(
            Arg::new(ARG_ACCESS_LOGS)
                .long(ARG_ACCESS_LOGS)
                .help("Emit a span per HTTP request")
                .env("NODE_ADMIN_ACCESS_LOGS")
                .action(ArgAction::Set)
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        );

    let command = node::with_args(command);
    let command = oidc::with_args(command);
    logging::with_args(command)
}
