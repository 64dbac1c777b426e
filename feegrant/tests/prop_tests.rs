use std::sync::Arc;

use proptest::prelude::*;

use cosmtx_feegrant::{Allowance, BasicAllowance, FeeGrantKeeper, PeriodicAllowance};
use cosmtx_nullables::NullKvStore;
use cosmtx_types::{AccAddress, Coin, Coins, Timestamp};

fn atoms(n: u128) -> Coins {
    Coins::new([Coin::new(n, "atom").unwrap()]).unwrap()
}

proptest! {
    /// Accepted fees never sum past the spend limit, and the grant disappears
    /// exactly when the limit is used up.
    #[test]
    fn basic_allowance_never_overspends(limit in 1u128..500, fees in prop::collection::vec(1u128..100, 1..20)) {
        let keeper = FeeGrantKeeper::new(Arc::new(NullKvStore::new()));
        let (granter, grantee) = (AccAddress::from([1; 20]), AccAddress::from([2; 20]));
        let now = Timestamp::new(0);
        let allowance = Allowance::Basic(BasicAllowance { spend_limit: atoms(limit), expiration: None });
        keeper.grant_allowance(&granter, &grantee, allowance, now).unwrap();

        let mut spent = 0u128;
        for fee in fees {
            if keeper.use_granted_fees(&granter, &grantee, &atoms(fee), &[], now).is_ok() {
                spent += fee;
            }
            prop_assert!(spent <= limit);
            let live = keeper.get_allowance(&granter, &grantee).unwrap().is_some();
            prop_assert_eq!(live, spent < limit);
        }
    }

    /// Within one period the accepted total never exceeds the period limit.
    #[test]
    fn periodic_caps_each_period(limit in 1u128..100, fees in prop::collection::vec(1u128..40, 1..20)) {
        let keeper = FeeGrantKeeper::new(Arc::new(NullKvStore::new()));
        let (granter, grantee) = (AccAddress::from([1; 20]), AccAddress::from([2; 20]));
        let allowance = Allowance::Periodic(PeriodicAllowance {
            basic: BasicAllowance::default(),
            period: 3600,
            period_spend_limit: atoms(limit),
            period_can_spend: Coins::empty(),
            period_reset: Timestamp::EPOCH,
        });
        keeper.grant_allowance(&granter, &grantee, allowance, Timestamp::new(100)).unwrap();

        let mut spent = 0u128;
        for (i, fee) in fees.into_iter().enumerate() {
            let now = Timestamp::new(100 + i as u64);
            if keeper.use_granted_fees(&granter, &grantee, &atoms(fee), &[], now).is_ok() {
                spent += fee;
            }
            prop_assert!(spent <= limit);
        }
    }
}
