use crate::error::Result;
use crate::message::Message;
use crate::router::FrameId;
use tracing::warn;
use url::Url;

/// The page surface the orchestrator drives.
///
/// A browser binding implements this over real frames; [`crate::sim`] provides
/// an in-process stand-in. Frames that are absent from the page return
/// [`crate::Error::MissingFrameTarget`].
pub trait FrameHost: Send + Sync {
    /// Point a frame at a new document.
    fn navigate(&self, frame: FrameId, url: &Url) -> Result<()>;

    /// Post a message into a frame's window.
    fn post_message(&self, frame: FrameId, message: &Message, target_origin: &str) -> Result<()>;

    /// Attach an activation listener to a control inside a loaded frame's
    /// document. `Ok(false)` when the document has no such control.
    fn bind_control(&self, frame: FrameId, control: &str) -> Result<bool>;
}

/// Raw inbound message as seen by the parent window.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// ASCII origin of the sender, e.g. `http://127.0.0.1:8080`.
    pub origin: String,
    pub source: Option<FrameId>,
    pub data: serde_json::Value,
}

impl Envelope {
    /// Wrap an encoded message. An unencodable message becomes `null`, which
    /// the parent drops as unrecognised.
    pub fn new(origin: impl Into<String>, source: Option<FrameId>, message: &Message) -> Self {
        let data = message.to_value().unwrap_or_else(|e| {
            warn!("Failed to encode {} message: {}", message.type_name(), e);
            serde_json::Value::Null
        });
        Self {
            origin: origin.into(),
            source,
            data,
        }
    }
}

/// Everything the page can report back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    FrameLoaded(FrameId),
    ControlActivated { frame: FrameId, control: String },
    Message(Envelope),
    /// The page is going away.
    Unload,
}
