use anyhow::Result;
use sesamo::cli::{actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;
    match action {
        Action::Server(args) => sesamo::cli::actions::server::handle(args).await,
    }
}
