use candela::{CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, candela_over, day_key, dt, series, temp_store, tr};

#[tokio::test]
async fn a_checksum_mismatch_falls_back_to_live_and_is_not_persisted() {
    let (_guard, store) = temp_store();
    let (archive, archive_control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);
    let (live, live_control) =
        DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);

    let day = dt(2024, 3, 5, 0, 0, 0);
    archive_control
        .set_archive_behavior(
            BTC,
            day.date_naive(),
            MockBehavior::Fail(CandelaError::Integrity {
                path: "spot/BTCUSDT/1m/2024-03-05.zip".into(),
                expected: "9c0f3a".into(),
                actual: "de41b7".into(),
            }),
        )
        .await;
    live_control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 60)),
        )
        .await;

    let candela = candela_over(&store, vec![archive, live]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 60);
    assert!(report.candles.iter().all(|c| c.source == DataSource::Live));
    assert!(report.coverage.is_full());

    // The mismatch is surfaced as a warning, not swallowed.
    assert!(
        report
            .warnings
            .iter()
            .any(|w| matches!(w, CandelaError::Integrity { .. }))
    );

    // Only the live fill reached the cache; the corrupt day contributed
    // nothing.
    let cached = store
        .load(&day_key(
            MarketType::Spot,
            BTC,
            Interval::I1m,
            day.date_naive(),
        ))
        .unwrap()
        .unwrap();
    assert_eq!(cached.len(), 60);
    assert_eq!(cached[0].open_time, dt(2024, 3, 5, 10, 0, 0));
}

#[tokio::test]
async fn unpublished_archive_days_fall_through_silently() {
    let (_guard, store) = temp_store();
    // No scripted days: every fetch_day reads as not-found.
    let (archive, _archive_control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);
    let (live, live_control) =
        DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    live_control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 60)),
        )
        .await;

    let candela = candela_over(&store, vec![archive, live]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 60);
    assert!(report.candles.iter().all(|c| c.source == DataSource::Live));
    // A day the archive never published is unavailability, not a failure.
    assert!(report.warnings.is_empty());
}
