use std::sync::Arc;

use crate::config::TransferConfig;
use crate::metrics::TransferMetrics;
use crate::state_reader::StateReader;
use crate::store::LedgerStore;
use crate::transfer::TransferEngine;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TransferEngine>,
    pub reader: Arc<StateReader>,
    pub metrics: Arc<TransferMetrics>,
    /// Used for health checks only
    pub store: Arc<dyn LedgerStore>,
}

impl AppState {
    /// Wire engine and reader over one store and one metrics registry.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        metrics: Arc<TransferMetrics>,
        transfer: &TransferConfig,
        debug_state_limit: usize,
    ) -> Self {
        Self {
            engine: Arc::new(TransferEngine::with_config(
                store.clone(),
                metrics.clone(),
                transfer,
            )),
            reader: Arc::new(StateReader::new(store.clone(), debug_state_limit)),
            metrics,
            store,
        }
    }
}
