//! Core types for the cosmtx transaction pipeline.
//!
//! This crate defines what every other crate in the workspace shares:
//! coins and decimal coins, bech32 addresses, the `Any` envelope, sign and
//! broadcast modes, the protobuf wire messages, the message registry and the
//! common error type.

pub mod address;
pub mod any;
pub mod coin;
pub mod dec;
pub mod error;
pub mod mode;
pub mod msg;
pub mod proto;
pub mod time;

pub use address::{address_hash, decode_address, encode_address, module_address, AccAddress, Bech32Config};
pub use any::Any;
pub use coin::{Coin, Coins};
pub use dec::{Dec, DecCoin, DecCoins};
pub use error::SdkError;
pub use mode::{BroadcastMode, SignMode};
pub use msg::{json_str, unique_signers, Msg, MsgRef, MsgRegistry, MsgSend};
pub use time::{format_duration, parse_duration, Timestamp};

/// Longest memo accepted in a transaction body.
pub const MAX_MEMO_CHARS: usize = 256;
