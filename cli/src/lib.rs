//! The `cosmtx` command-line client.
//!
//! [`cmd`] defines the command surface, [`config`] the client settings and
//! [`context`] the keyring, node and message registry every command shares.
//! [`execute`] runs one parsed command and returns the JSON to print.

pub mod cmd;
pub mod config;
pub mod context;
pub mod keys;
pub mod query;
pub mod tx;

use serde_json::Value;

pub use cmd::{Cli, Command};
pub use config::{ClientConfig, ConfigError, Overrides};
pub use context::ClientContext;

pub async fn execute(ctx: &ClientContext, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Tx(cmd) => tx::run(ctx, cmd).await,
        Command::Query(cmd) => query::run(ctx, cmd).await,
        Command::Keys(cmd) => keys::run(ctx, cmd),
    }
}
