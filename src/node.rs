use crate::api::{run_api_server, ApiState};
use crate::blockchain::Ledger;
use crate::cli::{init_tracing, open_ledger};
use crate::config::{load_config, Config};
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
    /// The loaded chain failed verification; reads still work, appends to a
    /// corrupt tail are refused by the ledger.
    Degraded,
}

/// Ledger service: one ledger instance shared by every request handler.
pub struct Node {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub state: NodeState,
}

impl Node {
    /// Load config, install tracing, open the ledger and check it once.
    pub fn init() -> Result<Self> {
        let config = load_config()?;
        init_tracing(&config.log_level);
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let mut node = Self {
            ledger: Arc::new(open_ledger(&config)?),
            config,
            state: NodeState::Booting,
        };

        let report = node.ledger.verify();
        node.state = match report.first_invalid_index {
            None => NodeState::Ready,
            Some(index) => {
                warn!(index, "persisted chain failed verification at startup");
                NodeState::Degraded
            }
        };

        if !node.ledger.supports_cross_process_locking() {
            info!("storage backend does not lock across processes; run a single writer");
        }
        Ok(node)
    }

    pub async fn start(self) -> Result<()> {
        info!(
            state = ?self.state,
            blocks = self.ledger.len(),
            port = self.config.api.port,
            "starting campuschain node"
        );
        let api_state = ApiState::new(self.ledger.clone(), self.config.api.max_payload_bytes);
        run_api_server(api_state, self.config.api.port).await
    }
}
