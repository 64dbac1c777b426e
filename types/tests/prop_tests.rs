use proptest::prelude::*;

use cosmtx_types::{decode_address, encode_address, Coin, Coins, Dec, Timestamp};

fn denom() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["atom", "stake", "uosmo", "ibc/ABCD"]).prop_map(String::from)
}

fn coins() -> impl Strategy<Value = Coins> {
    prop::collection::btree_map(denom(), 0u128..1_000_000, 0..4).prop_map(|raw| {
        Coins::new(raw.into_iter().map(|(d, a)| Coin { denom: d, amount: a })).unwrap()
    })
}

proptest! {
    /// Bech32 round-trip: decode(encode(p, b)) == (p, b).
    #[test]
    fn bech32_roundtrip(bytes in prop::collection::vec(any::<u8>(), 1..40)) {
        let text = encode_address("cosmos", &bytes).unwrap();
        let (hrp, back) = decode_address(&text).unwrap();
        prop_assert_eq!(hrp, "cosmos");
        prop_assert_eq!(back, bytes);
    }

    /// Coin sets stay sorted and zero-free after construction.
    #[test]
    fn coins_are_normalized(c in coins()) {
        let denoms: Vec<&str> = c.denoms().collect();
        let mut sorted = denoms.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(denoms, sorted);
        prop_assert!(c.iter().all(|coin| coin.amount > 0));
    }

    /// (a + b) - b == a.
    #[test]
    fn add_then_sub_is_identity(a in coins(), b in coins()) {
        let sum = a.checked_add(&b).unwrap();
        prop_assert!(sum.is_all_gte(&a));
        prop_assert_eq!(sum.safe_sub(&b).unwrap(), a);
    }

    /// Subtracting more than held always fails.
    #[test]
    fn over_subtraction_fails(a in coins(), extra in 1u128..100) {
        if let Some(first) = a.iter().next() {
            let too_much = Coins::from(Coin { denom: first.denom.clone(), amount: first.amount + extra });
            prop_assert!(a.safe_sub(&too_much).is_err());
        }
    }

    /// Display/parse round-trip for coin sets.
    #[test]
    fn coins_display_parse(c in coins()) {
        prop_assert_eq!(Coins::parse(&c.to_string()).unwrap(), c);
    }

    /// Dec display/parse round-trip.
    #[test]
    fn dec_roundtrip(atto in 0u128..10u128.pow(30)) {
        let d = Dec::from_atto(atto);
        prop_assert_eq!(d.to_string().parse::<Dec>().unwrap(), d);
    }

    /// RFC 3339 rendering round-trips through parsing.
    #[test]
    fn timestamp_rfc3339_roundtrip(secs in 0u64..4_000_000_000) {
        let t = Timestamp::new(secs);
        prop_assert_eq!(Timestamp::parse_rfc3339(&t.to_rfc3339()), Some(t));
    }
}
