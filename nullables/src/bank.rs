//! Nullable bank: in-memory balances and a fee collector.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cosmtx_store::FeeBank;
use cosmtx_types::{AccAddress, Coins, SdkError};

#[derive(Default)]
pub struct NullBank {
    balances: Mutex<HashMap<AccAddress, Coins>>,
    collected: Mutex<Coins>,
}

impl NullBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn balances(&self) -> MutexGuard<'_, HashMap<AccAddress, Coins>> {
        self.balances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_balance(&self, address: &AccAddress, coins: Coins) {
        self.balances().insert(address.clone(), coins);
    }

    /// Total fees collected so far.
    pub fn collected(&self) -> Coins {
        self.collected.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl FeeBank for NullBank {
    fn balance(&self, address: &AccAddress) -> Result<Coins, SdkError> {
        Ok(self.balances().get(address).cloned().unwrap_or_default())
    }

    fn deduct_fee(&self, payer: &AccAddress, fee: &Coins) -> Result<(), SdkError> {
        let mut balances = self.balances();
        let current = balances.get(payer).cloned().unwrap_or_default();
        let remaining = current.safe_sub(fee).map_err(|_| {
            SdkError::InsufficientFee(format!("{payer} has {current}, fee is {fee}"))
        })?;
        balances.insert(payer.clone(), remaining);
        let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        *collected = collected.checked_add(fee)?;
        Ok(())
    }
}
