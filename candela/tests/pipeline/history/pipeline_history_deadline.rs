use std::time::Duration;

use candela::{CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, builder_over, day_key, dt, series, temp_store, tr};

#[tokio::test(start_paused = true)]
async fn an_expired_deadline_returns_the_partial_rows_fetched_so_far() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    store
        .save(
            &day_key(MarketType::Spot, BTC, Interval::I1m, day.date_naive()),
            &series(day, Interval::I1m, 30),
        )
        .unwrap();

    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control.set_kline_behavior(BTC, MockBehavior::Hang).await;

    let candela = builder_over(&store)
        .with_connector(live)
        .request_timeout(Duration::from_millis(100))
        .max_retries(0)
        .build()
        .unwrap();

    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0)),
        )
        .await
        .unwrap();

    // The cached half hour survives the expiry as a partial result.
    assert_eq!(report.candles.len(), 30);
    assert!(report.candles.iter().all(|c| c.source == DataSource::Cache));
    assert!(!report.coverage.is_full());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| matches!(w, CandelaError::PartialCoverage { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn an_expired_deadline_with_no_rows_is_a_request_timeout() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control.set_kline_behavior(BTC, MockBehavior::Hang).await;

    let candela = builder_over(&store)
        .with_connector(live)
        .request_timeout(Duration::from_millis(100))
        .max_retries(0)
        .build()
        .unwrap();

    let err = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::RequestTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn a_hung_archive_is_abandoned_at_the_deadline() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    store
        .save(
            &day_key(MarketType::Spot, BTC, Interval::I1m, day.date_naive()),
            &series(day, Interval::I1m, 30),
        )
        .unwrap();

    let (archive, control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);
    control
        .set_archive_behavior(BTC, day.date_naive(), MockBehavior::Hang)
        .await;

    // The request deadline, not the generous provider timeout, bounds how
    // long the hung day is waited on.
    let candela = builder_over(&store)
        .with_connector(archive)
        .provider_timeout(Duration::from_secs(30))
        .request_timeout(Duration::from_millis(100))
        .max_retries(0)
        .build()
        .unwrap();

    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 30);
    assert_eq!(control.archive_requests().await.len(), 1);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| matches!(w, CandelaError::PartialCoverage { .. }))
    );
}
