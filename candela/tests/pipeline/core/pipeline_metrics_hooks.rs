use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use candela::{CandelaError, DataSource, Interval, MarketType, MetricsCollector};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, builder_over, day_key, dt, series, temp_store, tr};

#[derive(Default)]
struct RecordingMetrics {
    cache_hit_rows: AtomicU64,
    cache_misses: AtomicU64,
    archive_days: AtomicU64,
    live_rows: AtomicU64,
    retries: AtomicU64,
    checksum_failures: AtomicU64,
    shortfall_rows: AtomicU64,
}

impl MetricsCollector for RecordingMetrics {
    fn record_cache_hit(&self, rows: u64) {
        self.cache_hit_rows.fetch_add(rows, Ordering::Relaxed);
    }

    fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_archive_day(&self, _verified: bool, _rows: u64) {
        self.archive_days.fetch_add(1, Ordering::Relaxed);
    }

    fn record_live_fetch(&self, rows: u64) {
        self.live_rows.fetch_add(rows, Ordering::Relaxed);
    }

    fn record_retry(&self, _attempt: u32) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_coverage_shortfall(&self, missing_rows: u64) {
        self.shortfall_rows.fetch_add(missing_rows, Ordering::Relaxed);
    }
}

#[tokio::test]
async fn the_collector_observes_cache_live_and_shortfall_traffic() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    store
        .save(
            &day_key(MarketType::Spot, BTC, Interval::I1m, day.date_naive()),
            &series(day, Interval::I1m, 30),
        )
        .unwrap();

    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 0, 30, 0), Interval::I1m, 15)),
        )
        .await;

    let rec = Arc::new(RecordingMetrics::default());
    let candela = builder_over(&store)
        .with_connector(live)
        .metrics(rec.clone())
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

    assert_eq!(report.candles.len(), 45);
    assert_eq!(rec.cache_hit_rows.load(Ordering::Relaxed), 30);
    assert_eq!(rec.cache_misses.load(Ordering::Relaxed), 0);
    assert_eq!(rec.live_rows.load(Ordering::Relaxed), 15);
    assert_eq!(rec.shortfall_rows.load(Ordering::Relaxed), 15);
    assert_eq!(rec.archive_days.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn the_collector_counts_retries_and_checksum_failures() {
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
            MockBehavior::FailOnce(
                CandelaError::transient("mock-live", "connection reset by peer"),
                series(dt(2024, 3, 5, 10, 0, 0), Interval::I1m, 60),
            ),
        )
        .await;

    let rec = Arc::new(RecordingMetrics::default());
    let candela = builder_over(&store)
        .with_connector(archive)
        .with_connector(live)
        .metrics(rec.clone())
        .max_retries(2)
        .provider_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

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
    assert_eq!(rec.checksum_failures.load(Ordering::Relaxed), 1);
    assert_eq!(rec.retries.load(Ordering::Relaxed), 1);
}
