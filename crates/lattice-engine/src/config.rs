//! Engine configuration

use crate::history::DEFAULT_HISTORY_LIMIT;

/// Options for constructing an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of undo steps kept (default: 100)
    pub history_limit: usize,
    /// Size of sheets created without an explicit size, as (rows, cols)
    pub default_sheet_size: (u32, u32),
    /// Name of the sheet a new document starts with
    pub default_sheet_name: String,
    /// Identifier stamped on the revisions this engine produces
    pub client_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_sheet_size: (100, 26),
            default_sheet_name: "Sheet1".to_string(),
            client_id: "local".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_default_sheet_size(mut self, rows: u32, cols: u32) -> Self {
        self.default_sheet_size = (rows, cols);
        self
    }

    pub fn with_default_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.default_sheet_name = name.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }
}
