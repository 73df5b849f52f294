use candela::{CandelaError, DataSource, MarketType};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, candela_over, dt, funding_key, funding_series, temp_store, tr};

#[tokio::test]
async fn cached_settlements_narrow_the_live_fetch() {
    let (_guard, store) = temp_store();
    // Seed the first day of settlements.
    let day_one = dt(2024, 3, 5, 0, 0, 0);
    store
        .save_funding(
            &funding_key(MarketType::UmFutures, BTC, day_one.date_naive()),
            &funding_series(day_one, 3),
        )
        .unwrap();

    let (funding, control) =
        DynamicMockConnector::new_with_controller("mock-funding", DataSource::Live);
    control
        .set_funding_behavior(
            BTC,
            MockBehavior::Return(funding_series(dt(2024, 3, 6, 0, 0, 0), 3)),
        )
        .await;

    let candela = candela_over(&store, vec![funding]);
    let request = tr(day_one, dt(2024, 3, 7, 0, 0, 0));
    let report = candela
        .funding_rates_with_report(BTC, MarketType::UmFutures, request)
        .await
        .unwrap();

    assert_eq!(report.rates.len(), 6);
    assert!(
        report.rates[..3]
            .iter()
            .all(|r| r.source == DataSource::Cache)
    );
    assert!(
        report.rates[3..]
            .iter()
            .all(|r| r.source == DataSource::Live)
    );
    assert!(report.coverage.is_full());

    // Only the uncovered second day was requested upstream.
    let requests = control.funding_requests().await;
    assert_eq!(
        requests,
        vec![(
            BTC.to_string(),
            tr(dt(2024, 3, 6, 0, 0, 0), dt(2024, 3, 7, 0, 0, 0))
        )]
    );

    // The fill was persisted; a second pass never leaves the cache.
    control
        .set_funding_behavior(
            BTC,
            MockBehavior::Fail(CandelaError::connector(
                "mock-funding",
                "should not be called",
            )),
        )
        .await;
    let again = candela
        .funding_rates_with_report(BTC, MarketType::UmFutures, request)
        .await
        .unwrap();
    assert_eq!(again.rates.len(), 6);
    assert!(again.rates.iter().all(|r| r.source == DataSource::Cache));
    assert_eq!(control.funding_requests().await.len(), 1);
}
