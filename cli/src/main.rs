//! cosmtx: build, sign, broadcast and query Cosmos SDK transactions.

use clap::Parser;

use cosmtx_cli::{execute, ClientConfig, ClientContext, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cosmtx_utils::init_logging(cli.log_format, &cli.log_level);

    let config = ClientConfig::resolve(&cli.overrides())?;
    tracing::debug!(?config, "resolved client config");
    let ctx = ClientContext::open(config, cli.keyring_password.as_deref())?;

    let out = execute(&ctx, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
