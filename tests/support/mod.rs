// Each integration test crate compiles its own copy of this module
// and uses a different subset of it.
#![allow(dead_code)]

pub mod fakes;
pub mod temp_db;

use std::sync::Arc;

use augur::application::config::{ConfigResolver, RuntimeConfig};
use augur::application::progress::ScanProgress;
use augur::application::scanner::Scanner;
use fakes::{RecordingNotifier, ScriptedEstimator, ScriptedExchange};
use temp_db::TempDb;

/// A scanner wired over a temp database and scripted ports.
pub struct Rig {
    pub db: TempDb,
    pub exchange: Arc<ScriptedExchange>,
    pub estimator: Arc<ScriptedEstimator>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: ConfigResolver,
    pub scanner: Scanner,
}

impl Rig {
    pub fn new(name: &str, exchange: ScriptedExchange, estimator: ScriptedEstimator) -> Self {
        let db = TempDb::create(name);
        let exchange = Arc::new(exchange);
        let estimator = Arc::new(estimator);
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ConfigResolver::new(RuntimeConfig::default(), db.store.clone());
        let scanner = Scanner::new(
            db.store.clone(),
            exchange.clone(),
            estimator.clone(),
            notifier.clone(),
            config.clone(),
            Arc::new(ScanProgress::new()),
        );
        Self {
            db,
            exchange,
            estimator,
            notifier,
            config,
            scanner,
        }
    }

    /// Write runtime-config overrides.
    pub async fn configure(&self, entries: &[(&str, serde_json::Value)]) {
        let entries: Vec<(String, serde_json::Value)> = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        self.config.write(&entries).await.expect("write config");
    }
}
