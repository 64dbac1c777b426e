//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cosmtx_utils::LogFormat;

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "cosmtx", version, about = "Build, sign, broadcast and query Cosmos SDK transactions")]
pub struct Cli {
    /// Directory holding config/client.toml and the keyring.
    #[arg(long, global = true, env = "COSMTX_HOME")]
    pub home: Option<PathBuf>,

    /// CometBFT RPC endpoint, or a comma-separated list to rotate through.
    #[arg(long, global = true, env = "COSMTX_NODE")]
    pub node: Option<String>,

    #[arg(long, global = true, env = "COSMTX_CHAIN_ID")]
    pub chain_id: Option<String>,

    /// Keyring backend: "test", "file" or "os".
    #[arg(long, global = true, env = "COSMTX_KEYRING_BACKEND")]
    pub keyring_backend: Option<String>,

    /// Password for the file keyring backend.
    #[arg(long, global = true, env = "COSMTX_KEYRING_PASSWORD", hide_env_values = true)]
    pub keyring_password: Option<String>,

    /// Log level filter, e.g. "warn" or "debug,cosmtx_tx=trace".
    #[arg(long, global = true, default_value = "warn", env = "COSMTX_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, global = true, default_value = "human", env = "COSMTX_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            home: self.home.clone(),
            node: self.node.clone(),
            chain_id: self.chain_id.clone(),
            keyring_backend: self.keyring_backend.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transaction subcommands.
    #[command(subcommand)]
    Tx(TxCommand),

    /// Querying subcommands.
    #[command(subcommand)]
    Query(QueryCommand),

    /// Manage keyring keys.
    #[command(subcommand)]
    Keys(KeysCommand),
}

/// Flags shared by every command that builds or sends a transaction.
#[derive(Args, Debug, Clone)]
pub struct TxFlags {
    /// Name or address of the signing key.
    #[arg(long)]
    pub from: Option<String>,

    /// Gas limit, or "auto" to simulate first.
    #[arg(long, default_value = "")]
    pub gas: String,

    /// Multiplier applied to the simulated gas.
    #[arg(long, default_value_t = 1.0)]
    pub gas_adjustment: f64,

    /// Fees to pay, e.g. "10uatom".
    #[arg(long)]
    pub fees: Option<String>,

    /// Gas prices to derive fees from, e.g. "0.025uatom".
    #[arg(long)]
    pub gas_prices: Option<String>,

    #[arg(long, default_value = "")]
    pub memo: String,

    /// Block height after which the transaction is no longer valid.
    #[arg(long, default_value_t = 0)]
    pub timeout_height: u64,

    /// "direct", "amino-json", "direct-aux" or "textual".
    #[arg(long, default_value = "")]
    pub sign_mode: String,

    /// Account that pays the fees through a fee allowance.
    #[arg(long)]
    pub fee_granter: Option<String>,

    /// Account that pays the fees directly.
    #[arg(long)]
    pub fee_payer: Option<String>,

    /// "sync", "async" or "block".
    #[arg(long, default_value = "sync")]
    pub broadcast_mode: String,

    /// Do not contact the node; account number and sequence must be given.
    #[arg(long)]
    pub offline: bool,

    /// Print the unsigned transaction instead of signing it.
    #[arg(long)]
    pub generate_only: bool,

    #[arg(long)]
    pub account_number: Option<u64>,

    #[arg(long)]
    pub sequence: Option<u64>,
}

impl Default for TxFlags {
    fn default() -> Self {
        Self {
            from: None,
            gas: String::new(),
            gas_adjustment: 1.0,
            fees: None,
            gas_prices: None,
            memo: String::new(),
            timeout_height: 0,
            sign_mode: String::new(),
            fee_granter: None,
            fee_payer: None,
            broadcast_mode: "sync".into(),
            offline: false,
            generate_only: false,
            account_number: None,
            sequence: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    /// Bank transactions.
    #[command(subcommand)]
    Bank(BankCommand),

    /// Fee allowance transactions.
    #[command(subcommand)]
    Feegrant(FeegrantCommand),

    /// Sign a transaction file.
    Sign {
        file: PathBuf,
        /// Print only this key's signature.
        #[arg(long)]
        signature_only: bool,
        /// Replace existing signatures instead of appending.
        #[arg(long)]
        overwrite: bool,
        /// Sign as a member of this multisig key; prints the member signature.
        #[arg(long)]
        multisig: Option<String>,
        #[command(flatten)]
        flags: TxFlags,
    },

    /// Combine member signatures into a multisig signature.
    Multisign {
        file: PathBuf,
        /// Name of the multisig key in the keyring.
        name: String,
        #[arg(required = true)]
        signatures: Vec<PathBuf>,
        #[command(flatten)]
        flags: TxFlags,
    },

    /// Broadcast a signed transaction file.
    Broadcast {
        file: PathBuf,
        #[command(flatten)]
        flags: TxFlags,
    },

    /// Encode a JSON transaction file as base64 protobuf bytes.
    Encode { file: PathBuf },

    /// Decode base64 protobuf bytes to JSON.
    Decode { tx: String },

    /// Estimate the gas of a transaction file.
    Simulate {
        file: PathBuf,
        #[command(flatten)]
        flags: TxFlags,
    },
}

#[derive(Subcommand, Debug)]
pub enum BankCommand {
    /// Send coins from one account to another.
    Send {
        /// Key name or address of the sender.
        #[arg(value_name = "FROM")]
        sender: String,
        to: String,
        amount: String,
        #[command(flatten)]
        flags: TxFlags,
    },
}

#[derive(Subcommand, Debug)]
pub enum FeegrantCommand {
    /// Let <grantee> pay fees from <granter>'s balance.
    Grant {
        /// Key name or address of the granter.
        granter: String,
        grantee: String,
        /// Total that may be spent, e.g. "1000uatom". Unlimited when omitted.
        #[arg(long)]
        spend_limit: Option<String>,
        /// RFC 3339 expiration, e.g. "2027-01-01T00:00:00Z".
        #[arg(long)]
        expiration: Option<String>,
        /// Period length, e.g. "3600", "1h" or "7d".
        #[arg(long, requires = "period_limit")]
        period: Option<String>,
        /// Amount that may be spent per period.
        #[arg(long, requires = "period")]
        period_limit: Option<String>,
        /// Message type URLs the grant may pay for.
        #[arg(long, value_delimiter = ',')]
        allowed_messages: Vec<String>,
        #[command(flatten)]
        flags: TxFlags,
    },

    /// Remove an existing fee allowance.
    Revoke {
        granter: String,
        grantee: String,
        #[command(flatten)]
        flags: TxFlags,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Look up a committed transaction by hash.
    Tx { hash: String },

    /// Search transactions by events.
    Txs {
        /// Conditions joined with '&', e.g. "message.sender=cosmos1..&tx.height=5".
        #[arg(long)]
        events: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Account number and sequence of an address.
    Account { address: String },

    /// A block by height, or the latest block.
    Block { height: Option<u64> },
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Create a key, or import one from a mnemonic read on stdin.
    Add {
        name: String,
        /// Read a BIP-39 mnemonic from stdin.
        #[arg(long)]
        recover: bool,
        /// Key algorithm. Mnemonic-derived keys are always secp256k1.
        #[arg(long, default_value = "secp256k1")]
        algo: String,
        /// HD path for mnemonic-derived keys.
        #[arg(long, default_value = "m/44'/118'/0'/0/0")]
        hd_path: String,
        /// Build a multisig key from these key names.
        #[arg(long, value_delimiter = ',')]
        multisig: Vec<String>,
        #[arg(long, requires = "multisig")]
        multisig_threshold: Option<u32>,
    },

    /// Show a key by name.
    Show { name: String },

    /// List all keys.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bank_send_with_flags() {
        let cli = Cli::try_parse_from([
            "cosmtx", "tx", "bank", "send", "alice", "cosmos1xyz", "10uatom",
            "--gas", "auto", "--gas-adjustment", "1.5", "--fees", "500uatom",
            "--chain-id", "test-1", "--broadcast-mode", "block",
        ])
        .unwrap();
        assert_eq!(cli.chain_id.as_deref(), Some("test-1"));
        let Command::Tx(TxCommand::Bank(BankCommand::Send { sender, amount, flags, .. })) = cli.command else {
            panic!("expected bank send");
        };
        assert_eq!(sender, "alice");
        assert_eq!(flags.from, None);
        assert_eq!(amount, "10uatom");
        assert_eq!(flags.gas, "auto");
        assert_eq!(flags.gas_adjustment, 1.5);
        assert_eq!(flags.broadcast_mode, "block");
    }

    #[test]
    fn bank_send_accepts_from_flag_alongside_sender() {
        let cli = Cli::try_parse_from([
            "cosmtx", "tx", "bank", "send", "alice", "cosmos1xyz", "1uatom", "--from", "bob",
        ])
        .unwrap();
        let Command::Tx(TxCommand::Bank(BankCommand::Send { sender, flags, .. })) = cli.command else {
            panic!("expected bank send");
        };
        assert_eq!(sender, "alice");
        assert_eq!(flags.from.as_deref(), Some("bob"));
    }

    #[test]
    fn period_requires_limit() {
        assert!(Cli::try_parse_from([
            "cosmtx", "tx", "feegrant", "grant", "a", "b", "--period", "1h",
        ])
        .is_err());
        let cli = Cli::try_parse_from([
            "cosmtx", "tx", "feegrant", "grant", "a", "b", "--period", "1h",
            "--period-limit", "10uatom", "--allowed-messages", "/x.A,/x.B",
        ])
        .unwrap();
        let Command::Tx(TxCommand::Feegrant(FeegrantCommand::Grant { allowed_messages, .. })) = cli.command
        else {
            panic!("expected feegrant grant");
        };
        assert_eq!(allowed_messages, vec!["/x.A", "/x.B"]);
    }

    #[test]
    fn multisign_needs_signature_files() {
        assert!(Cli::try_parse_from(["cosmtx", "tx", "multisign", "tx.json", "ms"]).is_err());
    }
}
