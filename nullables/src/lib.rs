//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the pipeline (clock, node, key-value
//! store, hardware signer, balances) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod bank;
pub mod clock;
pub mod device;
pub mod node;
pub mod store;

pub use bank::NullBank;
pub use clock::NullClock;
pub use device::NullLedgerDevice;
pub use node::NullNode;
pub use store::NullKvStore;
