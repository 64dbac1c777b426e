//! Integration tests driving the whole pipeline:
//! factory → prepare → simulate → build → sign → encode → broadcast,
//! against a null node and an in-memory keyring.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cosmtx_crypto::KeyAlgo;
use cosmtx_keyring::{Keyring, LocalKeyring};
use cosmtx_nullables::NullNode;
use cosmtx_tx::{sign, Broadcaster, Factory, GasSetting, SignatureV2, TxBuilder};
use cosmtx_types::proto::TxRaw;
use cosmtx_types::{AccAddress, BroadcastMode, Coins, MsgRef, MsgRegistry, MsgSend, SdkError, SignMode};
use prost::Message;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn send(from: &AccAddress, amount: &str) -> MsgRef {
    Arc::new(MsgSend {
        from_address: from.clone(),
        to_address: AccAddress::from([0xee; 20]),
        amount: Coins::parse(amount).unwrap(),
    })
}

struct Env {
    node: Arc<NullNode>,
    keyring: Arc<LocalKeyring>,
    alice: AccAddress,
    bob: AccAddress,
}

fn env() -> Env {
    let node = Arc::new(NullNode::new("pipeline-1"));
    let keyring = Arc::new(LocalKeyring::in_memory());
    let alice = keyring.generate("alice", KeyAlgo::Secp256k1).unwrap().address();
    let bob = keyring.generate("bob", KeyAlgo::Secp256k1).unwrap().address();
    node.set_account(&alice, 5, 8, None);
    node.set_account(&bob, 6, 1, None);
    Env { node, keyring, alice, bob }
}

fn factory(env: &Env) -> Factory {
    Factory::new("pipeline-1")
        .with_keyring(env.keyring.clone())
        .with_client(env.node.clone())
}

fn addresses(builder: &TxBuilder) -> Vec<AccAddress> {
    builder.signatures().iter().map(SignatureV2::address).collect()
}

// ---------------------------------------------------------------------------
// 1. End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn build_sign_broadcast_commit() {
    let env = env();
    let msgs = vec![send(&env.alice, "10uatom")];

    let f = factory(&env)
        .with_from_name("alice")
        .with_gas_setting(GasSetting::Auto)
        .with_gas_adjustment(1.5)
        .with_fees(Coins::parse("500uatom").unwrap())
        .prepare(&env.alice)
        .await
        .unwrap();
    assert_eq!((f.account_number(), f.sequence()), (5, 8));

    let f = f.with_simulated_gas(msgs.clone()).await.unwrap();
    assert_eq!(f.gas(), 150_000);

    let mut tx = f.build_unsigned(msgs).unwrap();
    sign(&f, "alice", &mut tx, true).await.unwrap();
    let bytes = tx.encode();

    let res = Broadcaster::new(env.node.clone())
        .with_poll_interval(Duration::from_millis(5))
        .broadcast(&bytes, BroadcastMode::Block, &CancellationToken::new())
        .await
        .unwrap();
    assert!(res.is_ok());
    assert_eq!(res.txhash, tx.hash());
    assert_eq!(env.node.broadcasts(), vec![bytes.clone()]);

    let decoded = TxBuilder::decode(&bytes, &MsgRegistry::with_defaults()).unwrap();
    assert_eq!(decoded.fee().gas_limit, 150_000);
    assert_eq!(decoded.signatures()[0].sequence, 8);
}

#[tokio::test]
async fn simulation_failure_surfaces_before_broadcast() {
    let env = env();
    env.node.set_simulate_result(Err("insufficient funds".into()));
    let f = factory(&env).with_gas_adjustment(1.2);
    let err = f.calculate_gas(vec![send(&env.alice, "1uatom")]).await.unwrap_err();
    assert!(matches!(err, SdkError::GasEstimationFailed(_)));
    assert!(env.node.broadcasts().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Gas calculation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gas_is_adjusted_from_simulation() {
    let env = env();
    env.node.set_simulate_result(Ok(10));
    let f = factory(&env).with_gas_adjustment(1.2);
    assert_eq!(f.calculate_gas(vec![send(&env.alice, "1uatom")]).await.unwrap(), (10, 12));
    assert_eq!(env.node.simulate_requests().len(), 1);
}

// ---------------------------------------------------------------------------
// 3. Multi-signer rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn amino_signers_append_and_overwrite() {
    let env = env();
    let f = factory(&env).with_sign_mode(SignMode::LegacyAminoJson);
    let mut tx = f
        .build_unsigned(vec![send(&env.alice, "1uatom"), send(&env.bob, "2uatom")])
        .unwrap();

    sign(&f, "alice", &mut tx, false).await.unwrap();
    sign(&f, "bob", &mut tx, false).await.unwrap();
    assert_eq!(addresses(&tx), vec![env.alice.clone(), env.bob.clone()]);

    sign(&f, "bob", &mut tx, true).await.unwrap();
    assert_eq!(addresses(&tx), vec![env.bob.clone()]);
}

#[tokio::test]
async fn second_direct_signer_rejected() {
    let env = env();
    let f = factory(&env).with_sign_mode(SignMode::Direct);
    let mut tx = f
        .build_unsigned(vec![send(&env.alice, "1uatom"), send(&env.bob, "2uatom")])
        .unwrap();
    sign(&f, "alice", &mut tx, false).await.unwrap();
    assert_eq!(
        sign(&f, "bob", &mut tx, false).await.unwrap_err(),
        SdkError::DirectSignMultipleSigners
    );
}

// ---------------------------------------------------------------------------
// 4. Offline signing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_generate_then_sign_then_broadcast() {
    let env = env();
    let registry = MsgRegistry::with_defaults();

    let unsigned = Factory::new("pipeline-1")
        .with_offline(true)
        .with_generate_only(true)
        .build_unsigned(vec![send(&env.alice, "3uatom")])
        .unwrap()
        .to_json();

    let mut tx = TxBuilder::from_json(&unsigned, &registry).unwrap();
    let signer = Factory::new("pipeline-1")
        .with_offline(true)
        .with_account_number(5)
        .with_sequence(8)
        .with_keyring(env.keyring.clone());
    sign(&signer, "alice", &mut tx, true).await.unwrap();

    let raw = TxRaw::decode(tx.encode().as_slice()).unwrap();
    assert_eq!(raw.signatures.len(), 1);

    let res = Broadcaster::new(env.node.clone())
        .broadcast(&tx.encode(), BroadcastMode::Sync, &CancellationToken::new())
        .await
        .unwrap();
    assert!(res.is_ok());
    assert!(env.keyring.key("alice").is_ok());
}
