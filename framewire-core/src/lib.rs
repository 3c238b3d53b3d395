//! Frame orchestration for the Framewire parent page.
//!
//! The parent owns the deployment flag, decides what each frame shows, fetches
//! graph data once deployed and pushes it into the results frame over the
//! cross-frame message channel.

pub mod config;
pub mod deploy;
pub mod error;
pub mod host;
pub mod message;
pub mod messenger;
pub mod orchestrator;
pub mod router;
pub mod sim;
pub mod state;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use host::{Envelope, FrameHost, HostEvent};
pub use message::Message;
pub use messenger::{Messenger, OriginPolicy};
pub use orchestrator::{Orchestrator, SessionStats};
pub use router::{FrameDocuments, FrameId, FrameRoute, GraphStage, RoutePlan, Router};
pub use sim::{ResultsView, SimOptions, SimulatedFrames};
pub use state::{DeploymentState, FlagStore};
