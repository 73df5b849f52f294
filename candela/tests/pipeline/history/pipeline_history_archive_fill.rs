use std::sync::Arc;
use std::time::Duration;

use candela::{ArchiveDay, CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior, MockConnector};

use crate::helpers::{BTC, builder_over, candela_over, day_key, dt, series, temp_store, tr};

#[tokio::test]
async fn archive_days_fill_an_uncached_request() {
    let (_guard, store) = temp_store();
    let (archive, control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);
    let (live, live_control) =
        DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);

    let day = dt(2024, 3, 5, 0, 0, 0);
    control
        .set_archive_behavior(
            BTC,
            day.date_naive(),
            MockBehavior::Return(ArchiveDay {
                date: day.date_naive(),
                candles: series(day, Interval::I1m, 1440),
                verified: true,
                warning: None,
            }),
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
    assert!(report.candles.iter().all(|c| c.source == DataSource::Archive));
    assert_eq!(report.candles[0].open_time, dt(2024, 3, 5, 10, 0, 0));
    assert_eq!(report.candles[59].open_time, dt(2024, 3, 5, 10, 59, 0));
    assert!(report.coverage.is_full());
    assert_eq!(report.spans.len(), 1);
    assert_eq!(report.spans[0].rows, 60);

    // The live tier had nothing left to do.
    assert!(live_control.kline_requests().await.is_empty());

    // The verified day was persisted whole, not just the requested hour.
    let cached = store
        .load(&day_key(
            MarketType::Spot,
            BTC,
            Interval::I1m,
            day.date_naive(),
        ))
        .unwrap()
        .unwrap();
    assert_eq!(cached.len(), 1440);
}

#[tokio::test]
async fn a_request_spanning_midnight_pulls_both_days() {
    let (_guard, store) = temp_store();
    let (archive, control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);

    for day in [dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 6, 0, 0, 0)] {
        control
            .set_archive_behavior(
                BTC,
                day.date_naive(),
                MockBehavior::Return(ArchiveDay {
                    date: day.date_naive(),
                    candles: series(day, Interval::I1m, 1440),
                    verified: true,
                    warning: None,
                }),
            )
            .await;
    }

    let candela = candela_over(&store, vec![archive]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 23, 0, 0), dt(2024, 3, 6, 1, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 120);
    assert!(report.coverage.is_full());

    // Day downloads run concurrently, so the request order is unstable.
    let mut days: Vec<_> = control
        .archive_requests()
        .await
        .into_iter()
        .map(|(_, d)| d)
        .collect();
    days.sort_unstable();
    assert_eq!(
        days,
        vec![
            dt(2024, 3, 5, 0, 0, 0).date_naive(),
            dt(2024, 3, 6, 0, 0, 0).date_naive()
        ]
    );
}

#[tokio::test]
async fn an_unverified_day_serves_rows_but_is_not_persisted() {
    let (_guard, store) = temp_store();
    let (archive, control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);

    let day = dt(2024, 3, 5, 0, 0, 0);
    control
        .set_archive_behavior(
            BTC,
            day.date_naive(),
            MockBehavior::Return(ArchiveDay {
                date: day.date_naive(),
                candles: series(day, Interval::I1m, 1440),
                verified: false,
                warning: Some("no checksum sidecar published".into()),
            }),
        )
        .await;

    let candela = candela_over(&store, vec![archive]);
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
    assert!(report.candles.iter().all(|c| c.source == DataSource::Archive));
    assert!(report.warnings.iter().any(
        |w| matches!(w, CandelaError::Data(msg) if msg.contains("no checksum sidecar"))
    ));

    // Unverified rows are served but never written back.
    let cached = store
        .load(&day_key(
            MarketType::Spot,
            BTC,
            Interval::I1m,
            day.date_naive(),
        ))
        .unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn days_inside_the_freshness_window_skip_the_archive() {
    let (_guard, store) = temp_store();
    let (archive, archive_control) =
        DynamicMockConnector::new_with_controller("mock-archive", DataSource::Archive);
    let (live, live_control) =
        DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    live_control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 60)),
        )
        .await;

    // A window this wide marks every day as still unsettled.
    let candela = builder_over(&store)
        .with_connector(archive)
        .with_connector(live)
        .freshness_window(Duration::MAX)
        .build()
        .unwrap();
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
    assert!(report.warnings.is_empty());

    // The unsettled day was never offered to the archive tier.
    assert!(archive_control.archive_requests().await.is_empty());
}

#[tokio::test]
async fn the_static_mock_serves_a_verified_hour() {
    let (_guard, store) = temp_store();
    let candela = candela_over(&store, vec![Arc::new(MockConnector::new())]);

    let rows = candela
        .klines(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 10, 0, 0), dt(2024, 3, 5, 11, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 60);
    assert!(rows.iter().all(|c| c.source == DataSource::Archive));
}
