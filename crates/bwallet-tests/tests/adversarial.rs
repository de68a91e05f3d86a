//! Adversarial scenarios: a gateway that lies, fails or is handed bad input.
//!
//! The wallet must never sign a proposal it did not ask for, never broadcast
//! twice, and reject malformed requests before any network traffic.

use proptest::prelude::*;

use bwallet_core::coin::Coin;
use bwallet_core::error::GatewayError;
use bwallet_core::types::{OutputValue, Subchain};
use bwallet_tests::helpers::*;
use bwallet_wallet::keys::HdKey;
use bwallet_wallet::pipeline::Pipeline;
use bwallet_wallet::{PipelineState, TransactionBuilder, WalletError};

fn destination() -> String {
    let other = HdKey::from_seed(Coin::Btc, &[0x42; 32]).unwrap();
    address_at(&other, Subchain::External, 0)
}

fn funded(amounts: &[u64]) -> (HdKey, std::sync::Arc<MockGateway>) {
    let root = test_root(Coin::Btc);
    let gw = MockGateway::new(Coin::Btc);
    for (i, amount) in amounts.iter().enumerate() {
        gw.fund(&address_at(&root, Subchain::External, i as u32), *amount);
    }
    (root, gw)
}

// ---------------------------------------------------------------------------
// Dishonest gateway
// ---------------------------------------------------------------------------

#[tokio::test]
async fn smuggled_input_is_never_signed() {
    let (root, gw) = funded(&[30_000]);
    let stranger = HdKey::from_seed(Coin::Btc, &[0x99; 32]).unwrap();
    gw.inject_extra_input(&address_at(&stranger, Subchain::External, 0));
    let mut session = session(root, &gw);

    let err = session.send(&destination(), 10_000).await.unwrap_err();

    assert!(matches!(err, WalletError::TxVerification(_)), "{err:?}");
    assert_eq!(gw.count(GatewayCall::Broadcast), 0);
    assert!(gw.broadcasts().is_empty());
}

#[tokio::test]
async fn input_beyond_search_depth_is_key_not_found() {
    // Session search depth is 50; index 60 is owned but out of reach.
    let root = test_root(Coin::Btc);
    let gw = MockGateway::new(Coin::Btc);
    let far = address_at(&root, Subchain::External, 60);
    gw.fund(&far, 30_000);
    let mut session = session(root, &gw);

    let err = session.send(&destination(), 10_000).await.unwrap_err();

    assert_eq!(err, WalletError::KeyNotFound { address: far, depth: 50 });
    assert_eq!(gw.count(GatewayCall::Broadcast), 0);
}

// ---------------------------------------------------------------------------
// Broadcast failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_broadcast_is_attempted_once() {
    let (root, gw) = funded(&[30_000]);
    gw.fail_broadcast_with(GatewayError::Timeout("broadcast".into()));
    let mut session = session(root, &gw);

    let err = session.send(&destination(), 10_000).await.unwrap_err();

    assert_eq!(err, WalletError::Broadcast(GatewayError::Timeout("broadcast".into())));
    assert_eq!(gw.count(GatewayCall::Broadcast), 1);
}

#[tokio::test]
async fn failed_broadcast_leaves_pipeline_failed() {
    let (root, gw) = funded(&[30_000]);
    gw.fail_broadcast_with(GatewayError::Rejected("double spend".into()));

    let mut session = session(root.clone(), &gw);
    session.refresh().await.unwrap();
    let owned = session.state().cached_used.clone();
    let request = TransactionBuilder::new(Coin::Btc)
        .fund_from_wallet(session.wallet_name())
        .add_output(&destination(), OutputValue::Amount(5_000))
        .set_change_address(&address_at(&root, Subchain::Internal, 0))
        .build(None)
        .unwrap();

    let mut pipeline = Pipeline::new(&*gw);
    let result = pipeline.run_send(&root, &request, &owned, 50).await;

    assert!(matches!(result, Err(WalletError::Broadcast(_))));
    assert!(matches!(pipeline.state(), PipelineState::Failed { .. }));
    assert_eq!(gw.count(GatewayCall::Broadcast), 1);
}

// ---------------------------------------------------------------------------
// Rejected before the network
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_destination_makes_no_calls() {
    let (root, gw) = funded(&[30_000]);
    let mut session = session(root, &gw);

    let err = session.send("1NotAnAddress", 10_000).await.unwrap_err();

    assert!(matches!(err, WalletError::AddressValidation { .. }), "{err:?}");
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn wrong_coin_destination_is_rejected() {
    let (root, gw) = funded(&[30_000]);
    let ltc = address_at(&test_root(Coin::Ltc), Subchain::External, 0);
    let mut session = session(root, &gw);

    let err = session.send(&ltc, 10_000).await.unwrap_err();

    assert!(matches!(err, WalletError::AddressValidation { .. }), "{err:?}");
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let (root, gw) = funded(&[30_000]);
    let mut session = session(root, &gw);

    let err = session.send(&destination(), 0).await.unwrap_err();

    assert!(matches!(err, WalletError::InvalidAmount(_)));
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn public_root_cannot_send() {
    let (root, gw) = funded(&[30_000]);
    let public = HdKey::deserialize_any(&root.serialize_public()).unwrap();
    assert!(!public.is_private());
    let mut session = session(public, &gw);

    assert_eq!(session.send(&destination(), 1_000).await.unwrap_err(), WalletError::NotPrivateKey);
    assert_eq!(session.dump_private_keys().unwrap_err(), WalletError::NotPrivateKey);
    assert!(gw.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn overspend_never_reaches_gateway_build(extra in 1u64..1_000_000) {
        let (root, gw) = funded(&[20_000, 15_000]);
        let mut session = session(root, &gw);

        let err = runtime().block_on(session.send(&destination(), 35_000 + extra)).unwrap_err();

        prop_assert_eq!(err, WalletError::InsufficientBalance { have: 35_000, need: 35_000 + extra });
        prop_assert_eq!(gw.count(GatewayCall::BuildUnsigned), 0);
    }

    #[test]
    fn affordable_sends_broadcast_valid_signatures(amount in 1u64..=(35_000 - MOCK_FEE)) {
        let (root, gw) = funded(&[20_000, 15_000]);
        let mut session = session(root, &gw);

        let outcome = runtime().block_on(session.send(&destination(), amount)).unwrap();

        let is_broadcast = matches!(outcome.final_state, PipelineState::Broadcast { .. });
        prop_assert!(is_broadcast);
        let proposals = gw.proposals();
        let broadcasts = gw.broadcasts();
        prop_assert!(signatures_verify(&proposals[0], &broadcasts[0]));
        let paid: u64 = proposals[0].outputs.iter().map(|o| o.value).sum();
        let spent = if amount + MOCK_FEE <= 20_000 { 20_000 } else { 35_000 };
        prop_assert_eq!(paid + MOCK_FEE, spent);
    }
}
