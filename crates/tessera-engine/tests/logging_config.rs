//! The configured `log_filter` reaches the global subscriber. Kept in its
//! own test binary since a subscriber can be installed once per process.

use std::rc::Rc;

use tessera_edf::prelude::MemoryTextSource;
use tessera_engine::prelude::*;
use tracing::Level;

#[test]
fn built_manager_applies_the_configured_filter() {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let config = EngineConfig {
        log_filter: "warn".to_owned(),
        ..EngineConfig::default()
    };
    WorldManager::builder()
        .config(config)
        .text_source(Rc::new(MemoryTextSource::new()))
        .build()
        .unwrap();

    assert!(tracing::enabled!(Level::WARN));
    assert!(!tracing::enabled!(Level::INFO));
    // Already installed, so a second manager leaves the filter alone.
    WorldManager::builder()
        .config(EngineConfig::default())
        .text_source(Rc::new(MemoryTextSource::new()))
        .build()
        .unwrap();
    assert!(!tracing::enabled!(Level::INFO));
}
