//! In-process stand-in for the three frame documents.
//!
//! `SimulatedFrames` answers navigations the way the real documents do: the
//! frame reports it has loaded, the results document announces readiness and
//! the graph document sends its handshake. Everything it is asked to do is
//! recorded so a session can be inspected afterwards.

use crate::error::{Error, Result};
use crate::host::{Envelope, FrameHost, HostEvent};
use crate::message::Message;
use crate::router::{FrameId, FrameRoute};
use framewire_fetch::GraphDataset;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use url::Url;

/// What the results document currently renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultsView {
    /// Nothing delivered since the document loaded.
    #[default]
    Blank,
    Loading,
    Populated(GraphDataset),
}

impl ResultsView {
    pub fn dataset(&self) -> Option<&GraphDataset> {
        match self {
            ResultsView::Populated(dataset) => Some(dataset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Origin stamped on messages coming from the frames.
    pub origin: String,
    pub results_handshake: bool,
    pub graph_handshake: bool,
    /// How long a graph document takes before it sends `graphFrameReady`.
    /// Non-zero delays need a Tokio runtime.
    pub graph_setup: Duration,
    /// Controls present in the configuration document.
    pub config_controls: Vec<String>,
    /// Frames absent from the page.
    pub missing: Vec<FrameId>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            results_handshake: true,
            graph_handshake: true,
            graph_setup: Duration::from_millis(10),
            config_controls: vec!["deployBtn".to_string()],
            missing: Vec::new(),
        }
    }
}

#[derive(Default)]
struct SimState {
    navigations: Vec<FrameRoute>,
    posts: Vec<(FrameId, Message, String)>,
    bound: HashSet<(FrameId, String)>,
    /// Bumped on every graph navigation.
    graph_generation: u64,
}

fn lock_state(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    // A panic while holding the lock leaves plain recorded data behind.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SimulatedFrames {
    options: SimOptions,
    events: mpsc::UnboundedSender<HostEvent>,
    state: Arc<Mutex<SimState>>,
    view: watch::Sender<ResultsView>,
    bindings: watch::Sender<usize>,
}

impl SimulatedFrames {
    /// Create the frames and the event stream the orchestrator should consume.
    pub fn new(options: SimOptions) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(ResultsView::Blank);
        let (bindings, _) = watch::channel(0);

        let frames = Self {
            options,
            events,
            state: Arc::new(Mutex::new(SimState::default())),
            view,
            bindings,
        };
        (frames, rx)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock_state(&self.state)
    }

    fn emit(&self, event: HostEvent) {
        // A closed stream means the page already unloaded.
        let _ = self.events.send(event);
    }

    fn emit_from(&self, frame: FrameId, message: &Message) {
        self.emit(HostEvent::Message(Envelope::new(
            self.options.origin.clone(),
            Some(frame),
            message,
        )));
    }

    fn check_present(&self, frame: FrameId) -> Result<()> {
        if self.options.missing.contains(&frame) {
            Err(Error::MissingFrameTarget(frame))
        } else {
            Ok(())
        }
    }

    /// The graph document finishes its setup and sends its handshake, unless
    /// the frame was navigated elsewhere in the meantime.
    fn announce_graph_ready(&self) {
        let setup = self.options.graph_setup;
        if setup.is_zero() {
            self.emit_from(FrameId::Graph, &Message::GraphFrameReady);
            return;
        }

        let generation = self.lock().graph_generation;
        let state = self.state.clone();
        let events = self.events.clone();
        let envelope = Envelope::new(
            self.options.origin.clone(),
            Some(FrameId::Graph),
            &Message::GraphFrameReady,
        );
        tokio::spawn(async move {
            tokio::time::sleep(setup).await;
            if lock_state(&state).graph_generation == generation {
                let _ = events.send(HostEvent::Message(envelope));
            }
        });
    }

    /// Press a control. Ignored unless the parent bound it.
    pub fn click(&self, frame: FrameId, control: &str) -> bool {
        let bound = self.lock().bound.contains(&(frame, control.to_string()));
        if bound {
            self.emit(HostEvent::ControlActivated {
                frame,
                control: control.to_string(),
            });
        }
        bound
    }

    /// The results document asks for fresh data.
    pub fn request_refresh(&self) {
        self.emit_from(FrameId::Results, &Message::RefreshData);
    }

    /// Inject an arbitrary message, e.g. from a foreign origin.
    pub fn inject(&self, envelope: Envelope) {
        self.emit(HostEvent::Message(envelope));
    }

    pub fn unload(&self) {
        self.emit(HostEvent::Unload);
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultsView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> ResultsView {
        self.view.borrow().clone()
    }

    pub fn navigations(&self) -> Vec<FrameRoute> {
        self.lock().navigations.clone()
    }

    pub fn navigations_of(&self, frame: FrameId) -> Vec<Url> {
        self.lock()
            .navigations
            .iter()
            .filter(|r| r.frame == frame)
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn current(&self, frame: FrameId) -> Option<Url> {
        self.navigations_of(frame).pop()
    }

    /// Every `updateResults` payload posted to the results frame, in order.
    pub fn deliveries(&self) -> Vec<Option<GraphDataset>> {
        self.lock()
            .posts
            .iter()
            .filter_map(|(frame, message, _)| match (frame, message) {
                (FrameId::Results, Message::UpdateResults(payload)) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Target origins used for posts, in order.
    pub fn post_origins(&self) -> Vec<String> {
        self.lock().posts.iter().map(|(_, _, origin)| origin.clone()).collect()
    }

    pub fn is_bound(&self, frame: FrameId, control: &str) -> bool {
        self.lock().bound.contains(&(frame, control.to_string()))
    }

    /// Wait until the parent has bound `control`, or give up after `timeout`.
    pub async fn wait_for_binding(&self, frame: FrameId, control: &str, timeout: Duration) -> bool {
        let mut rx = self.bindings.subscribe();
        let wait = rx.wait_for(|_| self.is_bound(frame, control));
        matches!(tokio::time::timeout(timeout, wait).await, Ok(Ok(_)))
    }

    /// Wait until at least `count` results deliveries were posted.
    pub async fn wait_for_deliveries(&self, count: usize, timeout: Duration) -> bool {
        let mut rx = self.view.subscribe();
        let wait = rx.wait_for(|_| self.deliveries().len() >= count);
        matches!(tokio::time::timeout(timeout, wait).await, Ok(Ok(_)))
    }

    /// Wait until the results view satisfies `predicate`.
    pub async fn wait_for_view<F>(&self, timeout: Duration, predicate: F) -> Option<ResultsView>
    where
        F: FnMut(&ResultsView) -> bool,
    {
        let mut rx = self.view.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(predicate)).await {
            Ok(Ok(view)) => Some(view.clone()),
            _ => None,
        }
    }
}

impl FrameHost for SimulatedFrames {
    fn navigate(&self, frame: FrameId, url: &Url) -> Result<()> {
        self.check_present(frame)?;
        {
            let mut state = self.lock();
            state.navigations.push(FrameRoute::new(frame, url.clone()));
            // Listeners die with the old document.
            state.bound.retain(|(f, _)| *f != frame);
            if frame == FrameId::Graph {
                state.graph_generation += 1;
            }
        }

        if frame == FrameId::Results {
            self.view.send_replace(ResultsView::Blank);
        }

        self.emit(HostEvent::FrameLoaded(frame));
        match frame {
            FrameId::Results if self.options.results_handshake => {
                self.emit_from(frame, &Message::ResultsFrameReady)
            }
            FrameId::Graph if self.options.graph_handshake => self.announce_graph_ready(),
            _ => {}
        }
        Ok(())
    }

    fn post_message(&self, frame: FrameId, message: &Message, target_origin: &str) -> Result<()> {
        self.check_present(frame)?;
        self.lock()
            .posts
            .push((frame, message.clone(), target_origin.to_string()));

        if let (FrameId::Results, Message::UpdateResults(payload)) = (frame, message) {
            let view = match payload {
                Some(dataset) => ResultsView::Populated(dataset.clone()),
                None => ResultsView::Loading,
            };
            self.view.send_replace(view);
        }
        Ok(())
    }

    fn bind_control(&self, frame: FrameId, control: &str) -> Result<bool> {
        self.check_present(frame)?;
        let present = frame == FrameId::Config
            && self.options.config_controls.iter().any(|c| c == control);
        if present {
            self.lock().bound.insert((frame, control.to_string()));
            self.bindings.send_modify(|count| *count += 1);
        }
        Ok(present)
    }
}
