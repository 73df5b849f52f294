use candela::{CandelaError, DataSource, Interval, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, candela_over, candle, day_key, dt, series, temp_store, tr};

#[tokio::test]
async fn a_cached_prefix_narrows_the_live_fetch_to_the_gap() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    // Seed the first half hour as cached rows.
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
            MockBehavior::Return(series(dt(2024, 3, 5, 0, 30, 0), Interval::I1m, 30)),
        )
        .await;

    let candela = candela_over(&store, vec![live]);
    let request = tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0));
    let report = candela
        .klines_with_report(BTC, MarketType::Spot, Interval::I1m, request)
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 60);
    assert!(
        report.candles[..30]
            .iter()
            .all(|c| c.source == DataSource::Cache)
    );
    assert!(
        report.candles[30..]
            .iter()
            .all(|c| c.source == DataSource::Live)
    );
    assert!(report.coverage.is_full());
    assert_eq!(report.spans.len(), 2);
    assert_eq!(report.spans[0].source, DataSource::Cache);
    assert_eq!(report.spans[1].source, DataSource::Live);

    // Only the uncovered half hour went out.
    let requests = control.kline_requests().await;
    assert_eq!(
        requests,
        vec![(
            BTC.to_string(),
            tr(dt(2024, 3, 5, 0, 30, 0), dt(2024, 3, 5, 1, 0, 0))
        )]
    );

    // The live fill was persisted, so the same request now resolves from the
    // cache alone.
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Fail(CandelaError::connector("mock-live", "should not be called")),
        )
        .await;
    let again = candela
        .klines_with_report(BTC, MarketType::Spot, Interval::I1m, request)
        .await
        .unwrap();
    assert_eq!(again.candles.len(), 60);
    assert!(again.candles.iter().all(|c| c.source == DataSource::Cache));
    assert_eq!(control.kline_requests().await.len(), 1);
}

#[tokio::test]
async fn interior_gaps_fetch_as_separate_segments() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    // Cached fragments at [00:00, 00:10) and [00:20, 00:30).
    let mut seeded = series(day, Interval::I1m, 10);
    seeded.extend(series(dt(2024, 3, 5, 0, 20, 0), Interval::I1m, 10));
    store
        .save(
            &day_key(MarketType::Spot, BTC, Interval::I1m, day.date_naive()),
            &seeded,
        )
        .unwrap();

    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    // The mock replays one canned response per call, so hand it exactly the
    // rows the two gaps need.
    let mut gap_rows = series(dt(2024, 3, 5, 0, 10, 0), Interval::I1m, 10);
    gap_rows.extend(series(dt(2024, 3, 5, 0, 30, 0), Interval::I1m, 30));
    control
        .set_kline_behavior(BTC, MockBehavior::Return(gap_rows))
        .await;

    let candela = candela_over(&store, vec![live]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 60);
    assert!(report.coverage.is_full());
    let spans: Vec<_> = report.spans.iter().map(|s| (s.source, s.rows)).collect();
    assert_eq!(
        spans,
        vec![
            (DataSource::Cache, 10),
            (DataSource::Live, 10),
            (DataSource::Cache, 10),
            (DataSource::Live, 30),
        ]
    );

    // Two gaps far enough apart stay separate live calls, in span order.
    let requests = control.kline_requests().await;
    assert_eq!(
        requests,
        vec![
            (
                BTC.to_string(),
                tr(dt(2024, 3, 5, 0, 10, 0), dt(2024, 3, 5, 0, 20, 0))
            ),
            (
                BTC.to_string(),
                tr(dt(2024, 3, 5, 0, 30, 0), dt(2024, 3, 5, 1, 0, 0))
            ),
        ]
    );
}

#[tokio::test]
async fn nearby_gaps_coalesce_into_one_live_call() {
    let (_guard, store) = temp_store();
    let day = dt(2024, 3, 5, 0, 0, 0);
    // Cached rows at [00:00, 00:10) plus a lone bar at 00:11; the two
    // surrounding gaps sit within coalescing distance of each other.
    let mut seeded = series(day, Interval::I1m, 10);
    seeded.push(candle(dt(2024, 3, 5, 0, 11, 0), Interval::I1m));
    store
        .save(
            &day_key(MarketType::Spot, BTC, Interval::I1m, day.date_naive()),
            &seeded,
        )
        .unwrap();

    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    control
        .set_kline_behavior(
            BTC,
            MockBehavior::Return(series(dt(2024, 3, 5, 0, 10, 0), Interval::I1m, 50)),
        )
        .await;

    let candela = candela_over(&store, vec![live]);
    let report = candela
        .klines_with_report(
            BTC,
            MarketType::Spot,
            Interval::I1m,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 5, 1, 0, 0)),
        )
        .await
        .unwrap();

    assert_eq!(report.candles.len(), 60);
    assert!(report.coverage.is_full());

    // One coalesced span; the cached bar inside it is overwritten by the
    // higher-priority live row at the same open.
    let requests = control.kline_requests().await;
    assert_eq!(
        requests,
        vec![(
            BTC.to_string(),
            tr(dt(2024, 3, 5, 0, 10, 0), dt(2024, 3, 5, 1, 0, 0))
        )]
    );
    assert_eq!(report.candles[11].open_time, dt(2024, 3, 5, 0, 11, 0));
    assert_eq!(report.candles[11].source, DataSource::Live);
}
