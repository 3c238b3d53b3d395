use crate::error::{Error, Result};
use crate::host::{Envelope, FrameHost};
use crate::message::Message;
use crate::router::FrameId;
use framewire_fetch::GraphDataset;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::{Origin, Url};

/// Which senders the parent listens to, and where it posts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept from and post to any origin (`"*"`).
    #[default]
    AllowAny,
    AllowList(Vec<Origin>),
}

impl OriginPolicy {
    /// Build an allow-list from origin strings. An empty list means `AllowAny`.
    pub fn parse_list<S: AsRef<str>>(origins: &[S]) -> Result<Self> {
        if origins.is_empty() {
            return Ok(OriginPolicy::AllowAny);
        }

        let mut allowed = Vec::with_capacity(origins.len());
        for raw in origins {
            let raw = raw.as_ref().trim();
            let url = Url::parse(raw).map_err(|e| Error::InvalidOrigin(format!("{}: {}", raw, e)))?;
            let origin = url.origin();
            if !origin.is_tuple() {
                return Err(Error::InvalidOrigin(format!("{} has an opaque origin", raw)));
            }
            allowed.push(origin);
        }
        Ok(OriginPolicy::AllowList(allowed))
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::AllowAny => true,
            OriginPolicy::AllowList(allowed) => Url::parse(origin)
                .map(|u| allowed.contains(&u.origin()))
                .unwrap_or(false),
        }
    }
}

/// Parent-side end of the cross-frame channel.
///
/// Deliveries to the results frame are held until the frame has announced
/// readiness since it was last routed. Every readiness announcement produces
/// a `null` delivery first, followed by the current data set: the latest
/// fetch outcome since the results frame was last routed.
pub struct Messenger {
    host: Arc<dyn FrameHost>,
    policy: OriginPolicy,
    target_origin: String,
    results_ready: bool,
    current: Option<GraphDataset>,
    /// A fetch resolved while the frame was not ready and was never posted.
    pending: bool,
    sent: u64,
}

impl Messenger {
    pub fn new(host: Arc<dyn FrameHost>, policy: OriginPolicy, results_origin: String) -> Self {
        let target_origin = match &policy {
            OriginPolicy::AllowAny => {
                warn!("Cross-frame messages are accepted from and posted to any origin");
                "*".to_string()
            }
            OriginPolicy::AllowList(_) => results_origin,
        };

        Self {
            host,
            policy,
            target_origin,
            results_ready: false,
            current: None,
            pending: false,
            sent: 0,
        }
    }

    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    pub fn is_results_ready(&self) -> bool {
        self.results_ready
    }

    /// Number of `updateResults` messages actually posted.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Filter and decode an inbound message.
    pub fn accept(&self, envelope: &Envelope) -> Option<Message> {
        if !self.policy.allows(&envelope.origin) {
            debug!("Dropping message from disallowed origin {}", envelope.origin);
            return None;
        }

        match serde_json::from_value::<Message>(envelope.data.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("Ignoring unrecognised message from {}: {}", envelope.origin, e);
                None
            }
        }
    }

    /// Data set the results frame is shown after its next readiness.
    pub fn current(&self) -> Option<&GraphDataset> {
        self.current.as_ref()
    }

    /// The parent pointed the results frame at a document again.
    ///
    /// Every re-route starts a new fetch (or shows no data at all), so the
    /// previous data set stops being current.
    pub fn results_routed(&mut self) {
        self.results_ready = false;
        self.pending = false;
        if self.current.take().is_some() {
            debug!("Dropped current data set after results frame was re-routed");
        }
    }

    /// The results document announced it is listening. This also covers a
    /// document that reloaded on its own, which gets the current data again.
    pub fn on_results_ready(&mut self) {
        self.results_ready = true;
        self.post(None);
        if self.pending || self.current.is_some() {
            self.post(self.current.clone());
        }
        self.pending = false;
    }

    /// Deliver the outcome of a fetch. `None` shows the loading state.
    pub fn deliver(&mut self, payload: Option<GraphDataset>) {
        self.current = payload.clone();
        if self.results_ready {
            self.post(payload);
        } else {
            debug!("Results frame not ready, holding delivery");
            self.pending = true;
        }
    }

    fn post(&mut self, payload: Option<GraphDataset>) {
        let populated = payload.is_some();
        let message = Message::UpdateResults(payload);

        match self
            .host
            .post_message(FrameId::Results, &message, &self.target_origin)
        {
            Ok(()) => {
                self.sent += 1;
                info!(
                    "Delivered {} results to {}",
                    if populated { "populated" } else { "empty" },
                    FrameId::Results
                );
            }
            Err(Error::MissingFrameTarget(frame)) => {
                debug!("Skipping delivery, {} is not present", frame);
            }
            Err(e) => warn!("Failed to deliver results: {}", e),
        }
    }
}
