//! Fee allowances.
//!
//! A granter lets a grantee charge transaction fees to the granter's
//! balance, within the limits of an [`Allowance`]. The [`FeeGrantKeeper`]
//! stores grants in a [`cosmtx_store::KvStore`] and decrements them as fees
//! are spent; [`DeductFees`] is the ante step that decides who pays.

pub mod allowance;
pub mod ante;
pub mod keeper;
pub mod msgs;
pub mod proto;

pub use allowance::{AllowedMsgAllowance, Allowance, BasicAllowance, Outcome, PeriodicAllowance};
pub use ante::{DeductFees, FeeRequest};
pub use keeper::FeeGrantKeeper;
pub use msgs::{register, MsgGrantAllowance, MsgRevokeAllowance};
