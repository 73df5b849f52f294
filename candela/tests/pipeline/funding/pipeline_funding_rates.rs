use std::sync::Arc;

use candela::{CandelaError, DataSource, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior, MockConnector};

use crate::helpers::{BTC, candela_over, dt, funding_key, funding_series, temp_store, tr};

#[tokio::test]
async fn funding_is_rejected_on_spot_markets() {
    let (_guard, store) = temp_store();
    let candela = candela_over(&store, vec![Arc::new(MockConnector::new())]);

    let err = candela
        .funding_rates(
            BTC,
            MarketType::Spot,
            tr(dt(2024, 3, 5, 0, 0, 0), dt(2024, 3, 6, 0, 0, 0)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CandelaError::Unsupported { .. }));
}

#[tokio::test]
async fn settlements_fill_from_the_live_tier_and_persist() {
    let (_guard, store) = temp_store();
    let (funding, control) =
        DynamicMockConnector::new_with_controller("mock-funding", DataSource::Live);
    let start = dt(2024, 3, 5, 0, 0, 0);
    control
        .set_funding_behavior(BTC, MockBehavior::Return(funding_series(start, 6)))
        .await;

    let candela = candela_over(&store, vec![funding]);
    let report = candela
        .funding_rates_with_report(
            BTC,
            MarketType::UmFutures,
            tr(start, dt(2024, 3, 7, 0, 0, 0)),
        )
        .await
        .unwrap();

    // Three settlements per day over two days.
    assert_eq!(report.rates.len(), 6);
    assert!(report.rates.iter().all(|r| r.source == DataSource::Live));
    assert!(report.coverage.is_full());
    assert_eq!(report.rates[0].funding_time, start);
    assert_eq!(report.rates[5].funding_time, dt(2024, 3, 6, 16, 0, 0));

    // The whole aligned span went out as one request.
    let requests = control.funding_requests().await;
    assert_eq!(
        requests,
        vec![(BTC.to_string(), tr(start, dt(2024, 3, 7, 0, 0, 0)))]
    );

    // Settlements land in per-day cache files.
    let day_one = store
        .load_funding(&funding_key(
            MarketType::UmFutures,
            BTC,
            start.date_naive(),
        ))
        .unwrap()
        .unwrap();
    assert_eq!(day_one.len(), 3);
    let day_two = store
        .load_funding(&funding_key(
            MarketType::UmFutures,
            BTC,
            dt(2024, 3, 6, 0, 0, 0).date_naive(),
        ))
        .unwrap()
        .unwrap();
    assert_eq!(day_two.len(), 3);
}

#[tokio::test]
async fn a_misaligned_funding_request_snaps_to_the_settlement_grid() {
    let (_guard, store) = temp_store();
    let (funding, control) =
        DynamicMockConnector::new_with_controller("mock-funding", DataSource::Live);
    control
        .set_funding_behavior(
            BTC,
            MockBehavior::Return(funding_series(dt(2024, 3, 5, 8, 0, 0), 3)),
        )
        .await;

    let candela = candela_over(&store, vec![funding]);
    let report = candela
        .funding_rates_with_report(
            BTC,
            MarketType::UmFutures,
            tr(dt(2024, 3, 5, 3, 0, 0), dt(2024, 3, 6, 3, 0, 0)),
        )
        .await
        .unwrap();

    // 08:00 and 16:00 on the fifth, then the midnight settlement: the end
    // snaps back to the last settlement open preceding it.
    assert_eq!(report.rates.len(), 3);
    assert!(report.coverage.is_full());
    assert_eq!(report.rates[0].funding_time, dt(2024, 3, 5, 8, 0, 0));
    assert_eq!(report.rates[2].funding_time, dt(2024, 3, 6, 0, 0, 0));
}
