//! Host configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VmError;
use crate::gas_metering::{GasRefundPolicy, GasSchedule};
use crate::DEFAULT_MAX_GAS_LIMIT;

/// Configuration of a [`crate::VmHost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Costs of the host API
    pub gas_schedule: GasSchedule,
    /// Largest gas limit accepted for a top-level call
    pub max_gas_limit: u64,
    /// Storage keys starting with this prefix are reserved for the host
    pub protected_key_prefix: String,
    /// What happens to unused gas of synchronous children
    pub gas_refund: GasRefundPolicy,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            gas_schedule: GasSchedule::default(),
            max_gas_limit: DEFAULT_MAX_GAS_LIMIT,
            protected_key_prefix: "CROSSCALL".to_string(),
            gas_refund: GasRefundPolicy::None,
        }
    }
}

impl VmConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, VmError> {
        let config: VmConfig =
            toml::from_str(content).map_err(|e| VmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, VmError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VmError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), VmError> {
        if let Err(err) = self.gas_schedule.validate() {
            warn!(error = %err, "Rejected gas schedule");
            return Err(err);
        }
        if self.protected_key_prefix.is_empty() {
            warn!("Rejected empty protected key prefix");
            return Err(VmError::Config(
                "protected_key_prefix must not be empty".to_string(),
            ));
        }
        if self.max_gas_limit == 0 {
            return Err(VmError::Config("max_gas_limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Whether `key` falls under the reserved prefix.
    pub fn is_protected_key(&self, key: &[u8]) -> bool {
        key.starts_with(self.protected_key_prefix.as_bytes())
    }
}
