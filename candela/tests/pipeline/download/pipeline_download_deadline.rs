use std::time::Duration;

use candela::{CandelaError, DataSource, Interval};
use candela_mock::{DynamicMockConnector, MockBehavior};

use crate::helpers::{BTC, ETH, candela_over, dt, series, temp_store, tr};

#[tokio::test(start_paused = true)]
async fn the_batch_deadline_keeps_finished_symbols_and_flags_the_rest() {
    let (_guard, store) = temp_store();
    let (live, control) = DynamicMockConnector::new_with_controller("mock-live", DataSource::Live);
    let start = dt(2024, 3, 5, 10, 0, 0);
    control
        .set_kline_behavior(BTC, MockBehavior::Return(series(start, Interval::I1m, 60)))
        .await;
    control.set_kline_behavior(ETH, MockBehavior::Hang).await;

    let candela = candela_over(&store, vec![live]);
    let report = candela
        .download()
        .symbols([BTC, ETH])
        .unwrap()
        .interval(Interval::I1m)
        .range(tr(start, dt(2024, 3, 5, 11, 0, 0)))
        .deadline(Duration::from_millis(200))
        .run()
        .await
        .unwrap();

    // The fast symbol made it in before the deadline cut the batch off.
    assert_eq!(report.series.len(), 1);
    assert_eq!(report.series[0].symbol, BTC);
    assert_eq!(report.series[0].candles.len(), 60);

    // The stalled one is named in a timeout warning.
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        &report.warnings[0],
        CandelaError::RequestTimeout { capability } if capability.contains("ETHUSDT")
    ));
}
