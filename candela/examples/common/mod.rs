use std::sync::Arc;

use candela::CandelaConnector;

#[must_use]
pub fn get_connectors() -> Vec<Arc<dyn CandelaConnector>> {
    if std::env::var("CANDELA_EXAMPLES_USE_MOCK").is_ok() {
        println!("--- (Using Mock Connector for CI) ---");
        vec![Arc::new(candela_mock::MockConnector::new())]
    } else {
        vec![
            Arc::new(candela_binance::BinanceArchive::new()),
            Arc::new(candela_binance::BinanceLive::new()),
        ]
    }
}
