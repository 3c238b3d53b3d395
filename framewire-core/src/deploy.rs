use crate::error::Result;
use crate::host::FrameHost;
use crate::router::FrameId;
use crate::state::{DeploymentState, FlagStore};
use tracing::{error, info, warn};

/// Wires the deploy control inside the configuration frame and commits the
/// deployment when it fires.
#[derive(Debug, Clone)]
pub struct DeployHandler {
    control: String,
    bound: bool,
}

impl DeployHandler {
    pub fn new(control: impl Into<String>) -> Self {
        Self {
            control: control.into(),
            bound: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Attach to the control once the configuration frame has loaded.
    /// Runs again on every reload of that frame, since the old listener goes
    /// away with the old document.
    pub fn wire(&mut self, host: &dyn FrameHost) -> Result<bool> {
        self.bound = host.bind_control(FrameId::Config, &self.control)?;
        if self.bound {
            info!("Deploy control '{}' wired in {}", self.control, FrameId::Config);
        } else {
            warn!("{} has no '{}' control; deploy is unavailable", FrameId::Config, self.control);
        }
        Ok(self.bound)
    }

    pub fn matches(&self, frame: FrameId, control: &str) -> bool {
        self.bound && frame == FrameId::Config && control == self.control
    }

    /// Persist the deployment. Returns the new in-memory state, which is
    /// `Deployed` even when persisting failed.
    pub fn commit(&self, store: &FlagStore) -> DeploymentState {
        if let Err(e) = store.write(DeploymentState::Deployed) {
            error!("Failed to persist deployment flag: {}", e);
        }
        DeploymentState::Deployed
    }
}
