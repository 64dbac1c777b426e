//! Balance capability used when charging fees.

use cosmtx_types::{AccAddress, Coins, SdkError};

/// Fee collection against account balances.
pub trait FeeBank: Send + Sync {
    fn balance(&self, address: &AccAddress) -> Result<Coins, SdkError>;

    /// Move `fee` from `payer` to the fee collector. Fails with
    /// `InsufficientFee` when the balance cannot cover every denom.
    fn deduct_fee(&self, payer: &AccAddress, fee: &Coins) -> Result<(), SdkError>;
}
