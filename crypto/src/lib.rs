//! Key material for cosmtx.
//!
//! - **secp256k1** ECDSA with low-S signatures (the default account key)
//! - **Ed25519** for validator-style keys
//! - **BLS12-381** signatures over messages of at most 32 bytes
//! - Threshold multisig with a signer bitmap
//! - Hardware signers behind the [`LedgerDevice`] trait
//! - BIP-39 mnemonics with BIP-32 derivation on `m/44'/118'/0'/0/0`

pub mod bls;
pub mod ed25519;
pub mod hardware;
pub mod hash;
pub mod keys;
pub mod mnemonic;
pub mod multisig;
pub mod secp256k1;

pub use hardware::{HardwareKey, LedgerDevice};
pub use hash::{hash160, sha256, tx_hash};
pub use keys::{KeyAlgo, PrivateKey, PublicKey};
pub use mnemonic::{derive_secp256k1, generate_mnemonic, is_valid_mnemonic, HdPath};
pub use multisig::{LegacyAminoMultisig, MultisigBuilder};
