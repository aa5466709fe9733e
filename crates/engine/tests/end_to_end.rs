use app_config::types::{PairConfig, TradingSettings};
use app_config::LiveConfig;
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_types::{Candle, CaptainAmericaPhase, Granularity, Instrument, Line, Rate, RuleKind, Trend};
use database::{MemoryStore, RuleStore};
use engine::{Engine, Error, Evaluator, KeyLocks};
use events::{RuleEvent, TradeDetails};
use rules::{create_rules, IronMan, TradePlan, TradeRule};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const LOT: i64 = 10_000;

fn time(step: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(5 * step)
}

/// A candle whose close mid and ave mid both equal `mid`.
fn candle(instrument: &str, step: i64, mid: Decimal, line: Line) -> Candle {
    let flat = |price: Decimal| Rate { open: price, high: price, low: price, close: price };
    Candle {
        instrument: Instrument::new(instrument),
        granularity: Granularity::M5,
        bid: flat(mid - dec!(0.0002)),
        ask: flat(mid + dec!(0.0002)),
        time: time(step),
        volume: dec!(250),
        line,
        trend: Trend::Up,
    }
}

fn eurusd() -> Instrument {
    Instrument::new("EURUSD")
}

async fn store_with_swing() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .record_swing(&eurusd(), Granularity::M5, dec!(1.1040), dec!(1.0950))
        .await
        .unwrap();
    store
}

fn evaluator(store: &Arc<MemoryStore>, kinds: &[RuleKind]) -> Evaluator {
    let rules = create_rules(kinds, store.clone(), LOT).unwrap();
    Evaluator::new(rules, store.clone())
}

#[tokio::test]
async fn iron_man_sets_up_on_a_and_trades_on_b() {
    let store = store_with_swing().await;
    let evaluator = evaluator(&store, &[RuleKind::IronMan]);
    let before = candle("EURUSD", 0, dec!(1.1030), Line::Negative);
    let a = candle("EURUSD", 1, dec!(1.1050), Line::Positive);
    let b = candle("EURUSD", 2, dec!(1.1060), Line::Positive);

    let on_a = evaluator.on_candle(&before, &a).await.unwrap();
    assert_eq!(on_a.len(), 1);
    assert!(matches!(&on_a[0], RuleEvent::SetupHappened(c) if c.rule == RuleKind::IronMan && c.price == dec!(1.1050)));

    let status = store.find_iron_man(&eurusd(), Granularity::M5).await.unwrap().unwrap();
    assert_eq!(status.trend, Trend::Up);
    let entry = store
        .find_trade_rule(RuleKind::IronMan, &eurusd(), Granularity::M5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.candle_time, a.time);

    // Judging the setup candle itself never trades.
    let same_candle = IronMan::new(store.clone(), LOT).judge_trade_plan(&entry, &a).await.unwrap();
    assert_eq!(same_candle, TradePlan::none());
    assert!(store.find_iron_man(&eurusd(), Granularity::M5).await.unwrap().unwrap().active);

    let on_b = evaluator.on_candle(&a, &b).await.unwrap();
    assert_eq!(
        on_b,
        vec![RuleEvent::TradeHappened(TradeDetails {
            context: events::RuleContext {
                rule: RuleKind::IronMan,
                instrument: eurusd(),
                granularity: Granularity::M5,
                time: b.time,
                price: dec!(1.1060),
            },
            units: LOT,
        })]
    );
    assert!(!store.find_iron_man(&eurusd(), Granularity::M5).await.unwrap().unwrap().active);
    let entry = store
        .find_trade_rule(RuleKind::IronMan, &eurusd(), Granularity::M5)
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.active);
}

#[tokio::test]
async fn captain_america_is_not_confirmed_on_its_own_setup_candle() {
    let store = Arc::new(MemoryStore::new());
    let evaluator = evaluator(&store, &[RuleKind::CaptainAmerica]);
    let c0 = candle("EURUSD", 0, dec!(1.1000), Line::Positive);
    let c1 = candle("EURUSD", 1, dec!(1.1010), Line::Positive);
    let c2 = candle("EURUSD", 2, dec!(1.1005), Line::Negative);
    let c3 = candle("EURUSD", 3, dec!(1.1000), Line::Negative);

    let on_c1 = evaluator.on_candle(&c0, &c1).await.unwrap();
    assert!(matches!(on_c1.as_slice(), [RuleEvent::SetupHappened(_)]));

    // Two misses below the 1.1010 setup price expire it.
    assert!(evaluator.on_candle(&c1, &c2).await.unwrap().is_empty());
    let on_c3 = evaluator.on_candle(&c2, &c3).await.unwrap();
    assert!(matches!(on_c3.as_slice(), [RuleEvent::SetupExpired(c)] if c.price == dec!(1.1000)));

    let entry = store
        .find_trade_rule(RuleKind::CaptainAmerica, &eurusd(), Granularity::M5)
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.active);
}

#[tokio::test]
async fn both_rules_report_in_setup_then_trade_order() {
    let store = store_with_swing().await;
    let evaluator = evaluator(&store, &[RuleKind::CaptainAmerica, RuleKind::IronMan]);
    let c0 = candle("EURUSD", 0, dec!(1.1030), Line::Positive);
    let c1 = candle("EURUSD", 1, dec!(1.1045), Line::Positive);
    let c2 = candle("EURUSD", 2, dec!(1.1050), Line::Negative);

    let on_c1 = evaluator.on_candle(&c0, &c1).await.unwrap();
    let kinds: Vec<_> = on_c1.iter().map(|e| e.context().rule).collect();
    assert_eq!(kinds, vec![RuleKind::CaptainAmerica, RuleKind::IronMan]);

    let on_c2 = evaluator.on_candle(&c1, &c2).await.unwrap();
    let trades: Vec<_> = on_c2
        .iter()
        .map(|e| match e {
            RuleEvent::TradeHappened(t) => (t.context.rule, t.units),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(trades, vec![(RuleKind::CaptainAmerica, 0), (RuleKind::IronMan, LOT)]);
}

#[tokio::test]
async fn candles_from_different_streams_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let evaluator = evaluator(&store, &[RuleKind::CaptainAmerica]);

    let err = evaluator
        .on_candle(
            &candle("EURUSD", 0, dec!(1.1), Line::Positive),
            &candle("USDJPY", 1, dec!(150.1), Line::Positive),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MismatchedPair { .. }));

    let err = evaluator
        .on_candle(
            &candle("EURUSD", 2, dec!(1.1), Line::Positive),
            &candle("EURUSD", 1, dec!(1.1), Line::Positive),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { .. }));
}

#[tokio::test]
async fn replay_runs_each_configured_stream_independently() {
    let store = store_with_swing().await;
    let live = LiveConfig {
        pair_configs: vec![
            PairConfig {
                instrument: eurusd(),
                granularity: Granularity::M5,
                enabled: true,
                rules: vec![RuleKind::IronMan],
            },
            PairConfig {
                instrument: Instrument::new("USDJPY"),
                granularity: Granularity::M5,
                enabled: true,
                rules: vec![RuleKind::CaptainAmerica],
            },
            PairConfig {
                instrument: Instrument::new("GBPUSD"),
                granularity: Granularity::M5,
                enabled: false,
                rules: vec![RuleKind::CaptainAmerica],
            },
        ],
    };
    let trading = TradingSettings { order_lot: LOT, candle_history: 5 };
    let engine = Engine::new(&live, &trading, store.clone()).unwrap();

    // Interleaved streams; GBPUSD is disabled and must be ignored.
    let candles = vec![
        candle("EURUSD", 0, dec!(1.1030), Line::Positive),
        candle("USDJPY", 0, dec!(150.00), Line::Negative),
        candle("GBPUSD", 0, dec!(1.2700), Line::Positive),
        candle("EURUSD", 1, dec!(1.1050), Line::Positive),
        candle("USDJPY", 1, dec!(149.90), Line::Negative),
        candle("GBPUSD", 1, dec!(1.2710), Line::Positive),
        candle("EURUSD", 2, dec!(1.1060), Line::Positive),
        candle("USDJPY", 2, dec!(149.80), Line::Negative),
    ];

    let events = engine.replay(candles).await.unwrap();

    let summary: Vec<_> = events
        .iter()
        .map(|e| match e {
            RuleEvent::SetupHappened(c) => ("setup", c.instrument.to_string()),
            RuleEvent::TradeHappened(t) => ("trade", t.context.instrument.to_string()),
            RuleEvent::SetupExpired(c) => ("expired", c.instrument.to_string()),
        })
        .collect();
    assert!(summary.contains(&("setup", "EURUSD".to_string())));
    assert!(summary.contains(&("trade", "EURUSD".to_string())));
    assert!(summary.contains(&("setup", "USDJPY".to_string())));
    assert!(summary.contains(&("trade", "USDJPY".to_string())));
    assert!(summary.iter().all(|(_, instrument)| instrument != "GBPUSD"));
}

#[test]
fn engine_refuses_to_start_without_enabled_pairs() {
    let store: Arc<dyn RuleStore> = Arc::new(MemoryStore::new());
    let live = LiveConfig { pair_configs: vec![] };
    let trading = TradingSettings { order_lot: LOT, candle_history: 5 };
    assert!(Engine::new(&live, &trading, store).is_err());
}

#[tokio::test]
async fn an_updated_bar_does_not_use_up_the_second_judge() {
    let store = Arc::new(MemoryStore::new());
    let live = LiveConfig {
        pair_configs: vec![PairConfig {
            instrument: eurusd(),
            granularity: Granularity::M5,
            enabled: true,
            rules: vec![RuleKind::CaptainAmerica],
        }],
    };
    let trading = TradingSettings { order_lot: LOT, candle_history: 5 };
    let engine = Engine::new(&live, &trading, store.clone()).unwrap();

    // Step 2 arrives twice: the bar is updated while it is still forming.
    let events = engine
        .replay(vec![
            candle("EURUSD", 0, dec!(1.1000), Line::Positive),
            candle("EURUSD", 1, dec!(1.1010), Line::Positive),
            candle("EURUSD", 2, dec!(1.1000), Line::Negative),
            candle("EURUSD", 2, dec!(1.0995), Line::Negative),
        ])
        .await
        .unwrap();

    assert!(matches!(events.as_slice(), [RuleEvent::SetupHappened(c)] if c.time == time(1)));
    let status = store.find_captain_america(&eurusd(), Granularity::M5).await.unwrap().unwrap();
    assert_eq!(status.phase, CaptainAmericaPhase::Setup { second_judge: true });

    // The retry still belongs to the next distinct candle.
    let events = engine
        .replay(vec![
            candle("EURUSD", 2, dec!(1.0995), Line::Negative),
            candle("EURUSD", 3, dec!(1.1020), Line::Negative),
        ])
        .await
        .unwrap();
    assert!(matches!(events.as_slice(), [RuleEvent::TradeHappened(t)] if t.context.time == time(3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_candles_for_one_stream_set_up_once() {
    let store = Arc::new(MemoryStore::new());
    let evaluator = Arc::new(evaluator(&store, &[RuleKind::CaptainAmerica]));
    let c0 = candle("EURUSD", 0, dec!(1.1000), Line::Positive);
    let c1 = candle("EURUSD", 1, dec!(1.1010), Line::Positive);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let evaluator = evaluator.clone();
            let (c0, c1) = (c0.clone(), c1.clone());
            tokio::spawn(async move { evaluator.on_candle(&c0, &c1).await.unwrap() })
        })
        .collect();
    let mut setups = 0;
    for task in tasks {
        setups += task
            .await
            .unwrap()
            .iter()
            .filter(|e| matches!(e, RuleEvent::SetupHappened(_)))
            .count();
    }

    assert_eq!(setups, 1);
    let entry = store
        .find_trade_rule(RuleKind::CaptainAmerica, &eurusd(), Granularity::M5)
        .await
        .unwrap()
        .unwrap();
    assert!(entry.active);
    assert_eq!(entry.candle_time, time(1));
}

#[tokio::test]
async fn a_held_stream_lock_does_not_block_other_streams() {
    let locks = KeyLocks::default();
    let wait = std::time::Duration::from_millis(50);
    let _held = locks.acquire(&eurusd(), Granularity::M5).await;

    let other = tokio::time::timeout(wait, locks.acquire(&Instrument::new("USDJPY"), Granularity::M5)).await;
    assert!(other.is_ok());
    let other_granularity = tokio::time::timeout(wait, locks.acquire(&eurusd(), Granularity::H1)).await;
    assert!(other_granularity.is_ok());

    let same = tokio::time::timeout(wait, locks.acquire(&eurusd(), Granularity::M5)).await;
    assert!(same.is_err());
}
