pub mod server;

/// What the binary was asked to do.
#[derive(Debug)]
pub enum Action {
    /// Run the gateway until SIGINT or SIGTERM.
    Server(server::Args),
}

impl Action {
    /// # Errors
    /// Returns the action's startup or runtime error.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
        }
    }
}
