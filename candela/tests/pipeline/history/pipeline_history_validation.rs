use candela::{CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, candela_over, dt, series, temp_store, tr};

#[tokio::test]
async fn an_empty_symbol_is_rejected() {
    let (_guard, store) = temp_store();
    let (live, _control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    let candela = candela_over(&store, vec![live]);

    let err = candela
        .klines(
            "   ",
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("symbol")));
}

#[tokio::test]
async fn sub_minute_bars_are_rejected_off_spot() {
    let (_guard, store) = temp_store();
    let (live, _control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    let candela = candela_over(&store, vec![live]);

    let err = candela
        .klines(
            BTC,
            MarketType::UmFutures,
            Interval::I1s,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 10, 1, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("does not publish")));
}

#[tokio::test]
async fn a_range_without_a_complete_bar_is_rejected() {
    let (_guard, store) = temp_store();
    let (live, _control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    let candela = candela_over(&store, vec![live]);

    // Strictly inside one minute: no bar opens on the grid in here.
    let err = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 10), dt(2024, 3, 5, 10, 0, 50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("no complete")));
}

#[tokio::test]
async fn symbols_are_normalized_before_dispatch() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 60)),
        )
        .await;
    let candela = candela_over(&store, vec![live]);

    let report = candela
        .klines_with_report(
            "  btcusdt ",
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.symbol, BTC);
    assert_eq!(report.candles.len(), 60);
    let requests = control.kline_requests().await;
    assert_eq!(requests[0].0, BTC);
}

#[tokio::test]
async fn all_not_found_collapses_to_not_found() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Fail(CandelaError::not_found("no such listing")),
        )
        .await;
    let candela = candela_over(&store, vec![live]);

    let err = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::NotFound { what } if what.contains(BTC)));
}

#[tokio::test]
async fn mixed_failures_aggregate_into_all_sources_failed() {
    let (_guard, store) = temp_store();
    let (live_a, control_a) =
        DynamicMockConnector::new_with_controller("mock-live-a", DataSource::Live);
    let (live_b, control_b) =
        DynamicMockConnector::new_with_controller("mock-live-b", DataSource::Live);
    control_a
        .set_kline_behavior(
            BTC,
            MockBehavior::Fail(CandelaError::connector("mock-live-a", "HTTP 500")),
        )
        .await;
    control_b
        .set_kline_behavior(
            BTC,
            MockBehavior::Fail(CandelaError::not_found("delisted")),
        )
        .await;

    let candela = candela_over(&store, vec![live_a, live_b]);
    let err = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap_err();

    match err {
        CandelaError::AllSourcesFailed(inner) => {
            assert!(
                inner
                    .iter()
                    .any(|e| matches!(e, CandelaError::Connector { .. }))
            );
            assert!(
                inner
                    .iter()
                    .any(|e| matches!(e, CandelaError::NotFound { .. }))
            );
        }
        other => panic!("expected AllSourcesFailed, got {other}"),
    }
}
