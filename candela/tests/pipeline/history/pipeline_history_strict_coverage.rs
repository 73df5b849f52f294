use candela::{CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, builder_over, candela_over, dt, series, temp_store, tr};

#[tokio::test]
async fn a_short_result_reports_partial_coverage_by_default() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    // The upstream only has the first half hour of the requested hour.
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 30)),
        )
        .await;

    let candela = candela_over(&store, vec![live]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 30);
    assert!(report.candles.iter().all(|c| c.source == DataSource::Live));
    assert!(!report.coverage.is_full());
    assert_eq!(report.coverage.expected_rows, 60);
    assert_eq!(report.coverage.actual_rows, 30);
    assert_eq!(
        report.coverage.missing,
        vec![tr(dt(2024, 3, 5, 10, 30, 0), dt(2024, 3, 5, 11, 0, 0))]
    );
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        CandelaError::PartialCoverage {
            expected_rows: 60,
            actual_rows: 30,
        }
    )));
}

#[tokio::test]
async fn strict_coverage_escalates_the_shortfall_to_an_error() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 30)),
        )
        .await;

    let candela = builder_over(&store)
        .with_connector(live)
        .strict_coverage(true)
        .build()
        .unwrap();

    let err = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CandelaError::PartialCoverage {
            expected_rows: 60,
            actual_rows: 30,
        }
    ));
}
