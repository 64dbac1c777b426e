//! Transaction pipeline: build, sign, broadcast.
//!
//! - [`Factory`]: account preparation, unsigned builds, gas simulation
//! - [`sign`]: signing with a keyring key under each sign mode
//! - [`Broadcaster`]: sync, async and block submission
//! - [`AuxBuilder`] / [`AuxTxAssembler`]: signatures from non-paying signers
//! - [`multisign`]: combining member signatures for a multisig account

pub mod account;
pub mod aux_signer;
pub mod broadcast;
pub mod builder;
pub mod factory;
pub mod gas;
pub mod multisign;
pub mod sign_mode;
pub mod signer;
pub mod signing;
pub mod textual;

pub use account::{Account, AccountRetriever, NodeAccountRetriever};
pub use aux_signer::{AuxBuilder, AuxSignerData, AuxTxAssembler};
pub use broadcast::Broadcaster;
pub use builder::{Fee, TxBuilder};
pub use factory::Factory;
pub use gas::GasSetting;
pub use multisign::{multisign, sign_as_member};
pub use sign_mode::{canonical_json, sign_bytes};
pub use signer::sign;
pub use signing::{SignatureData, SignatureV2, SignerData};
pub use textual::{CoinMetadataQuerier, NodeMetadataQuerier, StaticMetadata};
