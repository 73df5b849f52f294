use std::sync::Arc;

use candela::{Candela, CandelaError, DataSource};
use candela_mock::{DynamicMockConnector, MockConnector};

use crate::helpers::{builder_over, temp_store};

#[test]
fn build_accepts_one_connector_and_a_cache() {
    let (_guard, store) = temp_store();
    let candela = builder_over(&store)
        .with_connector(Arc::new(MockConnector::new()))
        .build();
    assert!(candela.is_ok());
}

#[test]
fn build_rejects_an_empty_tier_list() {
    let (_guard, store) = temp_store();
    let err = builder_over(&store).build().unwrap_err();
    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("no connectors")));
}

#[test]
fn build_rejects_a_missing_cache_tier() {
    let err = Candela::builder()
        .with_connector(Arc::new(MockConnector::new()))
        .build()
        .unwrap_err();
    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("no cache tier")));
}

#[test]
fn build_rejects_duplicate_connector_names() {
    let (_guard, store) = temp_store();
    // Two static mocks share the fixed "candela-mock" name.
    let err = builder_over(&store)
        .with_connector(Arc::new(MockConnector::new()))
        .with_connector(Arc::new(MockConnector::with_source(DataSource::Archive)))
        .build()
        .unwrap_err();
    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("duplicate connector")));
}

#[test]
fn build_rejects_a_connector_shadowing_the_cache_name() {
    let (_guard, store) = temp_store();
    let (shadow, _control) =
        DynamicMockConnector::new_with_controller("candela-cache", DataSource::Live);
    let err = builder_over(&store)
        .with_connector(shadow)
        .build()
        .unwrap_err();
    assert!(matches!(err, CandelaError::Validation(msg) if msg.contains("duplicate connector")));
}
