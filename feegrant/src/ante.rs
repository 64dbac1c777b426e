//! Fee deduction step of the ante path.

use tracing::debug;

use cosmtx_store::{FeeBank, KvStore};
use cosmtx_types::{AccAddress, Coins, MsgRef, SdkError, Timestamp};

use crate::keeper::FeeGrantKeeper;

/// The fee part of a transaction as the ante step sees it.
#[derive(Clone, Debug)]
pub struct FeeRequest<'a> {
    pub amount: &'a Coins,
    /// Explicit payer, or the first signer.
    pub payer: &'a AccAddress,
    pub granter: Option<&'a AccAddress>,
    pub msgs: &'a [MsgRef],
}

pub struct DeductFees<'a, S> {
    keeper: &'a FeeGrantKeeper<S>,
    bank: &'a dyn FeeBank,
    fee_granter_enabled: bool,
}

impl<'a, S: KvStore> DeductFees<'a, S> {
    pub fn new(keeper: &'a FeeGrantKeeper<S>, bank: &'a dyn FeeBank, fee_granter_enabled: bool) -> Self {
        Self {
            keeper,
            bank,
            fee_granter_enabled,
        }
    }

    /// Charge the fee and return the account that paid it.
    pub fn deduct(&self, req: &FeeRequest<'_>, now: Timestamp) -> Result<AccAddress, SdkError> {
        let mut deduct_from = req.payer.clone();
        if let Some(granter) = req.granter {
            if !self.fee_granter_enabled {
                return Err(SdkError::InvalidRequest("fee grants are not enabled".into()));
            }
            if granter != req.payer {
                self.keeper
                    .use_granted_fees(granter, req.payer, req.amount, req.msgs, now)
                    .map_err(|e| match e {
                        SdkError::GrantNotFound { .. }
                        | SdkError::GrantExpired
                        | SdkError::AllowedMsgDisallowed(_) => e,
                        other => SdkError::InsufficientFee(format!(
                            "{granter} does not allow to pay fees for {}: {other}",
                            req.payer
                        )),
                    })?;
            }
            deduct_from = granter.clone();
        }

        if !req.amount.is_zero() {
            self.bank.deduct_fee(&deduct_from, req.amount)?;
        }
        debug!(payer = %deduct_from, fee = %req.amount, "deducted fee");
        Ok(deduct_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cosmtx_nullables::{NullBank, NullKvStore};

    use cosmtx_types::MsgSend;

    use crate::allowance::{Allowance, AllowedMsgAllowance, BasicAllowance};

    fn addr(b: u8) -> AccAddress {
        AccAddress::from([b; 20])
    }

    fn coins(s: &str) -> Coins {
        Coins::parse(s).unwrap()
    }

    fn setup() -> (FeeGrantKeeper<Arc<NullKvStore>>, NullBank) {
        let keeper = FeeGrantKeeper::new(Arc::new(NullKvStore::new()));
        let bank = NullBank::new();
        bank.set_balance(&addr(1), coins("1000atom"));
        bank.set_balance(&addr(2), coins("5atom"));
        keeper
            .grant_allowance(
                &addr(1),
                &addr(2),
                Allowance::Basic(BasicAllowance {
                    spend_limit: coins("100atom"),
                    expiration: None,
                }),
                Timestamp::new(0),
            )
            .unwrap();
        (keeper, bank)
    }

    #[test]
    fn granter_pays_through_allowance() {
        let (keeper, bank) = setup();
        let fee = coins("30atom");
        let req = FeeRequest { amount: &fee, payer: &addr(2), granter: Some(&addr(1)), msgs: &[] };
        let paid = DeductFees::new(&keeper, &bank, true).deduct(&req, Timestamp::new(1)).unwrap();
        assert_eq!(paid, addr(1));
        assert_eq!(bank.balance(&addr(1)).unwrap(), coins("970atom"));
        assert_eq!(bank.balance(&addr(2)).unwrap(), coins("5atom"));
        assert_eq!(bank.collected(), fee);
    }

    #[test]
    fn payer_pays_without_granter() {
        let (keeper, bank) = setup();
        let fee = coins("6atom");
        let req = FeeRequest { amount: &fee, payer: &addr(2), granter: None, msgs: &[] };
        assert!(matches!(
            DeductFees::new(&keeper, &bank, true).deduct(&req, Timestamp::new(1)),
            Err(SdkError::InsufficientFee(_))
        ));
    }

    #[test]
    fn granter_rejected_when_disabled() {
        let (keeper, bank) = setup();
        let fee = coins("1atom");
        let req = FeeRequest { amount: &fee, payer: &addr(2), granter: Some(&addr(1)), msgs: &[] };
        assert!(matches!(
            DeductFees::new(&keeper, &bank, false).deduct(&req, Timestamp::new(1)),
            Err(SdkError::InvalidRequest(_))
        ));
        assert!(bank.collected().is_empty());
    }

    #[test]
    fn over_allowance_is_insufficient_fee() {
        let (keeper, bank) = setup();
        let fee = coins("101atom");
        let req = FeeRequest { amount: &fee, payer: &addr(2), granter: Some(&addr(1)), msgs: &[] };
        assert!(matches!(
            DeductFees::new(&keeper, &bank, true).deduct(&req, Timestamp::new(1)),
            Err(SdkError::InsufficientFee(_))
        ));
        assert_eq!(bank.balance(&addr(1)).unwrap(), coins("1000atom"));
    }

    #[test]
    fn missing_grant_is_reported() {
        let (keeper, bank) = setup();
        let fee = coins("1atom");
        let req = FeeRequest { amount: &fee, payer: &addr(3), granter: Some(&addr(1)), msgs: &[] };
        assert!(matches!(
            DeductFees::new(&keeper, &bank, true).deduct(&req, Timestamp::new(1)),
            Err(SdkError::GrantNotFound { .. })
        ));
    }

    #[test]
    fn disallowed_message_keeps_its_kind() {
        let (keeper, bank) = setup();
        keeper
            .grant_allowance(
                &addr(1),
                &addr(4),
                Allowance::Allowed(AllowedMsgAllowance {
                    allowance: Box::new(Allowance::Basic(BasicAllowance {
                        spend_limit: coins("100atom"),
                        expiration: None,
                    })),
                    allowed_messages: vec!["/cosmos.gov.v1beta1.MsgVote".into()],
                }),
                Timestamp::new(0),
            )
            .unwrap();
        let send: MsgRef = Arc::new(MsgSend {
            from_address: addr(4),
            to_address: addr(5),
            amount: coins("1atom"),
        });
        let fee = coins("1atom");
        let msgs = [send];
        let req = FeeRequest { amount: &fee, payer: &addr(4), granter: Some(&addr(1)), msgs: &msgs };
        assert_eq!(
            DeductFees::new(&keeper, &bank, true).deduct(&req, Timestamp::new(1)),
            Err(SdkError::AllowedMsgDisallowed("/cosmos.bank.v1beta1.MsgSend".into()))
        );
        assert!(bank.collected().is_empty());
    }
}
