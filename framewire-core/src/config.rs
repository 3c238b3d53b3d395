//! Orchestrator configuration

use crate::messenger::OriginPolicy;
use crate::router::FrameDocuments;
use std::time::Duration;

/// Settle delay used when nothing else is configured.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Id of the deploy button inside the configuration document.
pub const DEFAULT_DEPLOY_CONTROL: &str = "deployBtn";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Documents each frame can be routed to
    pub documents: FrameDocuments,

    /// Fallback delay before the graph frame leaves its loading document.
    /// `None` waits for the graph frame's ready handshake only.
    pub settle_delay: Option<Duration>,

    /// Accepted message origins
    pub origins: OriginPolicy,

    /// Element id of the deploy control in the configuration frame
    pub deploy_control: String,
}

impl OrchestratorConfig {
    pub fn new(documents: FrameDocuments) -> Self {
        Self {
            documents,
            settle_delay: Some(DEFAULT_SETTLE_DELAY),
            origins: OriginPolicy::AllowAny,
            deploy_control: DEFAULT_DEPLOY_CONTROL.to_string(),
        }
    }

    pub fn with_settle_delay(mut self, delay: Option<Duration>) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_deploy_control(mut self, control: impl Into<String>) -> Self {
        self.deploy_control = control.into();
        self
    }
}
