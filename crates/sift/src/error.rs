//! Engine error taxonomy, classified by behavior.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("search cancelled")]
    Cancelled,

    #[error("coordinated search exceeded {:?}", timeout)]
    SearchTimeout { timeout: Duration },

    #[error("{service}: authentication rejected")]
    DriverAuth { service: String },

    #[error("{service}: driver fault: {reason}")]
    Driver { service: String, reason: String },

    #[error("upstream `{upstream}` failed: {reason}")]
    Upstream { upstream: String, reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl EngineError {
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn upstream(upstream: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upstream {
            upstream: upstream.into(),
            reason: reason.into(),
        }
    }

    /// Errors that end the request for one service while others continue.
    pub fn is_terminal_for_service(&self) -> bool {
        matches!(self, Self::DriverAuth { .. })
    }

    /// Transient faults that never abort a request on their own: they degrade
    /// to empty results at the nearest component boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Driver { .. })
    }
}

impl From<debrid::DebridError> for EngineError {
    fn from(err: debrid::DebridError) -> Self {
        match err {
            debrid::DebridError::Auth { service } => Self::DriverAuth {
                service: service.to_string(),
            },
            debrid::DebridError::NotConfigured { vendor } => Self::Driver {
                service: vendor,
                reason: "not configured".to_string(),
            },
            debrid::DebridError::Driver { service, reason } => Self::Driver {
                service: service.to_string(),
                reason,
            },
        }
    }
}
