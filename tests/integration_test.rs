//! Integration Tests - Strategies Against Market Adapters
//!
//! Tests the interaction between usecases, the `AgentMarket` port and
//! both the in-memory `MarketSnapshot` adapter and mockall mocks. One
//! mock prices buys the way the FPMM contract does (integer wei math)
//! and serves as a cross-check oracle for the float CPMM math.

use mockall::mock;

use cpmm_kelly_engine::adapters::MarketSnapshot;
use cpmm_kelly_engine::config::SolverConfig;
use cpmm_kelly_engine::domain::error::StrategyError;
use cpmm_kelly_engine::domain::fees::MarketFees;
use cpmm_kelly_engine::domain::probability::Probability;
use cpmm_kelly_engine::domain::trade::{
    CategoricalProbabilisticAnswer, MarketId, OutcomeStr, Position, Trade, TradeType,
};
use cpmm_kelly_engine::domain::value::{CollateralToken, OutcomeToken, OutcomeWei, Usd};
use cpmm_kelly_engine::ports::AgentMarket;
use cpmm_kelly_engine::usecases::betting_strategy::{BettingStrategy, StrategyKind};
use cpmm_kelly_engine::usecases::kelly::KellyBettingStrategy;
use cpmm_kelly_engine::usecases::max_accuracy::MaxAccuracyBettingStrategy;

// ---- Mock Definitions ----

mock! {
    pub Market {}

    impl AgentMarket for Market {
        fn id(&self) -> MarketId;
        fn outcomes(&self) -> Vec<OutcomeStr>;
        fn probabilities(&self) -> Vec<Probability>;
        fn outcome_token_pool(&self) -> Option<Vec<OutcomeToken>>;
        fn fees(&self) -> MarketFees;
        fn invalid_outcome_index(&self) -> Option<usize>;
        fn get_buy_token_amount(
            &self,
            bet_amount: Usd,
            outcome: &OutcomeStr,
        ) -> Result<OutcomeToken, StrategyError>;
        fn get_in_usd(&self, amount: CollateralToken) -> Usd;
        fn get_usd_in_token(&self, amount: Usd) -> CollateralToken;
    }
}

const ONE: u128 = 1_000_000_000_000_000_000;

fn ceildiv(x: u128, y: u128) -> u128 {
    if x == 0 { 0 } else { (x - 1) / y + 1 }
}

/// FPMM `calcBuyAmount` in integer wei, without the contract's extra
/// `ONE` scaling of the running balance so pools up to ~18 tokens fit in
/// `u128`.
fn contract_buy_amount(investment: u128, outcome_index: usize, balances: &[u128], fee: u128) -> u128 {
    let investment_minus_fees = investment - investment * fee / ONE;
    let buy_token_pool_balance = balances[outcome_index];
    let mut ending_outcome_balance = buy_token_pool_balance;
    for (i, balance) in balances.iter().enumerate() {
        if i != outcome_index {
            let numerator = ending_outcome_balance
                .checked_mul(*balance)
                .expect("pool too large for u128 wei math");
            ending_outcome_balance = ceildiv(numerator, balance + investment_minus_fees);
        }
    }
    buy_token_pool_balance + investment_minus_fees - ending_outcome_balance
}

fn to_wei(amount: f64) -> u128 {
    let wei = OutcomeToken::new(amount).as_wei().expect("amount fits in wei");
    u128::try_from(wei.raw()).expect("non-negative amount")
}

fn binary_outcomes() -> Vec<OutcomeStr> {
    vec![OutcomeStr::yes(), OutcomeStr::no()]
}

/// Mock binary market priced like the on-chain contract.
fn contract_market(yes: f64, no: f64, fee: f64) -> MockMarket {
    let balances = vec![to_wei(yes), to_wei(no)];
    let fee_wei = to_wei(fee);
    let outcomes = binary_outcomes();

    let mut market = MockMarket::new();
    market.expect_id().returning(|| "0xcontract".to_string());
    let listed = outcomes.clone();
    market.expect_outcomes().returning(move || listed.clone());
    market.expect_probabilities().returning(move || {
        let total = yes + no;
        vec![Probability::clamped(no / total), Probability::clamped(yes / total)]
    });
    market
        .expect_outcome_token_pool()
        .returning(move || Some(vec![OutcomeToken::new(yes), OutcomeToken::new(no)]));
    market
        .expect_fees()
        .returning(move || MarketFees::new(fee, 0.0).unwrap());
    market.expect_invalid_outcome_index().returning(|| None);
    market.expect_get_in_usd().returning(|amount| Usd::new(amount.value()));
    market
        .expect_get_usd_in_token()
        .returning(|amount| CollateralToken::new(amount.value()));
    market
        .expect_get_buy_token_amount()
        .returning(move |bet, outcome| {
            let index = outcomes
                .iter()
                .position(|o| o == outcome)
                .ok_or_else(|| StrategyError::MissingOutcome(outcome.to_string()))?;
            let bought = contract_buy_amount(to_wei(bet.value()), index, &balances, fee_wei);
            let bought = i128::try_from(bought).expect("fits in i128");
            Ok(OutcomeWei::new(bought).as_token())
        });
    market
}

// ---- Cross-check Oracle ----

#[test]
fn test_buy_amount_matches_contract_calculation() {
    let cases = [
        (10.0, 10.0, 0.0, 10.0),
        (3.598_141_798_265_44, 13.618_140_347_782_146, 0.02, 1.0),
        (5.0, 12.0, 0.02, 0.37),
        (9.5, 1.25, 0.01, 4.0),
    ];
    for (yes, no, fee, bet) in cases {
        let oracle = contract_market(yes, no, fee);
        let snapshot = MarketSnapshot::binary(
            "0xsnapshot",
            OutcomeToken::new(yes),
            OutcomeToken::new(no),
            MarketFees::new(fee, 0.0).unwrap(),
        );
        for outcome in binary_outcomes() {
            let expected = oracle.get_buy_token_amount(Usd::new(bet), &outcome).unwrap();
            let actual = snapshot.get_buy_token_amount(Usd::new(bet), &outcome).unwrap();
            assert!(
                ((actual.value() - expected.value()) / expected.value()).abs() < 1e-9,
                "pool ({yes}, {no}) fee {fee} bet {bet} on {outcome}: {actual:?} vs {expected:?}"
            );
        }
    }
}

#[test]
fn test_new_p_yes_on_mock_uses_pool() {
    let oracle = contract_market(10.0, 10.0, 0.0);
    let p = oracle
        .get_new_p_yes(Usd::new(10.0), &OutcomeStr::yes())
        .unwrap()
        .unwrap();
    // Pool moves from (10, 10) to (15, 20).
    assert!((p.value() - 20.0 / 35.0).abs() < 1e-9);
}

#[test]
fn test_kelly_trades_agree_with_contract_market() {
    let strategy = KellyBettingStrategy::new(Usd::new(1.0)).with_max_price_impact(Some(0.5));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let (yes, no) = (3.598_141_798_265_44, 13.618_140_347_782_146);

    let on_oracle = strategy
        .calculate_trades(None, &answer, &contract_market(yes, no, 0.0))
        .unwrap();
    let on_snapshot = strategy
        .calculate_trades(
            None,
            &answer,
            &MarketSnapshot::binary("0xsnapshot", OutcomeToken::new(yes), OutcomeToken::new(no), MarketFees::zero()),
        )
        .unwrap();

    assert_eq!(on_oracle.len(), 1);
    assert_eq!(on_snapshot.len(), 1);
    assert_eq!(on_oracle[0].outcome, OutcomeStr::yes());
    assert_eq!(on_oracle[0].outcome, on_snapshot[0].outcome);
    assert!((on_oracle[0].amount.value() - on_snapshot[0].amount.value()).abs() < 1e-9);
}

// ---- Guaranteed Loss ----

#[test]
fn test_guaranteed_loss_when_tokens_never_pay_back() {
    let mut market = MockMarket::new();
    market.expect_id().returning(|| "0xlossy".to_string());
    market.expect_outcomes().returning(binary_outcomes);
    market.expect_invalid_outcome_index().returning(|| None);
    // Every buy returns half of what it costs.
    market
        .expect_get_buy_token_amount()
        .returning(|bet, _| Ok(OutcomeToken::new(bet.value() * 0.5)));
    market.expect_get_in_usd().returning(|amount| Usd::new(amount.value()));

    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let err = strategy.calculate_trades(None, &answer, &market).unwrap_err();
    assert!(err.is_guaranteed_loss(), "unexpected error: {err}");
}

#[test]
fn test_missing_outcome_is_reported() {
    let mut market = MockMarket::new();
    market.expect_id().returning(|| "0xother".to_string());
    market
        .expect_outcomes()
        .returning(|| vec![OutcomeStr::new("Red"), OutcomeStr::new("Blue")]);
    market.expect_invalid_outcome_index().returning(|| None);

    let strategy = MaxAccuracyBettingStrategy::new(Usd::new(1.0));
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let err = strategy.calculate_trades(None, &answer, &market).unwrap_err();
    assert!(matches!(err, StrategyError::MissingOutcome(_)));
}

// ---- Strategies on Snapshots ----

#[test]
fn test_kelly_underpriced_concrete_scenario() {
    let market = MarketSnapshot::binary(
        "0xconcrete",
        OutcomeToken::new(3.598_141_798_265_440_462),
        OutcomeToken::new(13.618_140_347_782_145_810),
        MarketFees::zero(),
    );
    let answer = CategoricalProbabilisticAnswer::binary(0.9, 1.0).unwrap();
    let trades = KellyBettingStrategy::new(Usd::new(1.0))
        .calculate_trades(None, &answer, &market)
        .unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_type, TradeType::Buy);
    assert_eq!(trades[0].outcome, OutcomeStr::yes());
    assert!(trades[0].amount > 0.0 && trades[0].amount <= Usd::new(1.0));
}

#[test]
fn test_kelly_does_not_double_up_existing_position() {
    let market = MarketSnapshot::binary("0xheld", OutcomeToken::new(10.0), OutcomeToken::new(10.0), MarketFees::zero());
    let answer = CategoricalProbabilisticAnswer::binary(0.7, 1.0).unwrap();
    let strategy = KellyBettingStrategy::new(Usd::new(5.0));

    let first = strategy.calculate_trades(None, &answer, &market).unwrap();
    let held = Position::new("0xheld").with_amount(first[0].outcome.clone(), first[0].amount);
    let second = strategy.calculate_trades(Some(&held), &answer, &market).unwrap();
    assert!(second.is_empty(), "re-running on the same position traded {second:?}");
}

#[test]
fn test_kelly_converts_usd_through_market_rate() {
    // One unit of collateral is worth 2 USD: a 10 USD bankroll is 5 collateral.
    let market = MarketSnapshot::binary("0xrate", OutcomeToken::new(10.0), OutcomeToken::new(10.0), MarketFees::zero())
        .with_usd_per_collateral(2.0);
    let answer = CategoricalProbabilisticAnswer::binary(0.7, 1.0).unwrap();
    let trades = KellyBettingStrategy::new(Usd::new(10.0))
        .calculate_trades(None, &answer, &market)
        .unwrap();
    assert_eq!(trades.len(), 1);
    assert!((trades[0].amount.value() - 2.0 * 1.464_245_625_862_614).abs() < 1e-9);
}

#[test]
fn test_strategies_built_from_config() {
    let solver = SolverConfig::default();
    let kinds: Vec<StrategyKind> = serde_json::from_str(
        r#"[
            { "kind": "max_accuracy", "bet_amount": { "type": "static", "value": 1.0 } },
            { "kind": "max_expected_value", "bet_amount": { "type": "proportion", "value": 0.01 } },
            { "kind": "kelly", "max_bet_amount": { "type": "static", "value": 5.0 }, "max_price_impact": 0.3 },
            { "kind": "max_accuracy_with_kelly_scaled_bets", "max_bet_amount": { "type": "static", "value": 5.0 } }
        ]"#,
    )
    .unwrap();
    let market = MarketSnapshot::binary("0xcfg", OutcomeToken::new(10.0), OutcomeToken::new(10.0), MarketFees::new(0.02, 0.0).unwrap());
    let answer = CategoricalProbabilisticAnswer::binary(0.8, 1.0).unwrap();

    for kind in &kinds {
        let strategy = kind.build(Usd::new(100.0), &solver);
        let trades: Vec<Trade> = strategy.calculate_trades(None, &answer, &market).unwrap();
        assert_eq!(trades.len(), 1, "{kind}");
        assert_eq!(trades[0].outcome, OutcomeStr::yes(), "{kind}");
        assert!(trades[0].amount <= strategy.maximum_possible_bet_amount(), "{kind}");
    }
}

#[test]
fn test_categorical_kelly_never_bets_invalid_outcome() {
    let mut market = MarketSnapshot::categorical(
        "0xinvalid",
        vec![OutcomeStr::new("A"), OutcomeStr::new("B"), OutcomeStr::new("Invalid")],
        vec![OutcomeToken::new(10.0), OutcomeToken::new(10.0), OutcomeToken::new(40.0)],
        MarketFees::zero(),
    );
    market.invalid_outcome_index = Some(2);
    let answer = CategoricalProbabilisticAnswer::new(
        [(OutcomeStr::new("A"), 0.6), (OutcomeStr::new("B"), 0.4)]
            .into_iter()
            .map(|(o, p)| (o, Probability::new(p).unwrap()))
            .collect(),
        1.0,
    )
    .unwrap();
    let trades = KellyBettingStrategy::new(Usd::new(5.0))
        .with_multiple_bets(true)
        .calculate_trades(None, &answer, &market)
        .unwrap();
    assert!(!trades.is_empty());
    assert!(trades.iter().all(|t| t.outcome != OutcomeStr::new("Invalid")));
}
