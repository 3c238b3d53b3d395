use crate::config::OrchestratorConfig;
use crate::deploy::DeployHandler;
use crate::error::{Error, Result};
use crate::host::{FrameHost, HostEvent};
use crate::message::Message;
use crate::messenger::Messenger;
use crate::router::{FrameId, FrameRoute, GraphStage, Router};
use crate::state::{DeploymentState, FlagStore};
use framewire_fetch::{DatasetSource, FetchError, GraphDataset};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Why a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Deploy,
    Refresh,
}

struct FetchOutcome {
    seq: u64,
    trigger: FetchTrigger,
    result: std::result::Result<GraphDataset, FetchError>,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub deploys: u64,
    pub refreshes: u64,
    pub fetches_started: u64,
    pub fetches_failed: u64,
    pub deliveries: u64,
}

/// The parent page.
///
/// Owns the deployment state and is the only writer of frame locations. All
/// work happens on one task; fetches run detached and report back over a
/// channel, so a slow fetch never blocks navigation or messaging.
pub struct Orchestrator {
    config: OrchestratorConfig,
    store: FlagStore,
    state: DeploymentState,
    host: Arc<dyn FrameHost>,
    source: Arc<dyn DatasetSource>,
    router: Router,
    messenger: Messenger,
    deploy: DeployHandler,
    graph_stage: GraphStage,
    settle_deadline: Option<Instant>,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    fetch_seq: u64,
    stats: SessionStats,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: FlagStore,
        host: Arc<dyn FrameHost>,
        source: Arc<dyn DatasetSource>,
    ) -> Self {
        let router = Router::new(config.documents.clone());
        let messenger = Messenger::new(
            host.clone(),
            config.origins.clone(),
            config.documents.results_origin(),
        );
        let deploy = DeployHandler::new(config.deploy_control.clone());
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        Self {
            config,
            store,
            state: DeploymentState::NotDeployed,
            host,
            source,
            router,
            messenger,
            deploy,
            graph_stage: GraphStage::Placeholder,
            settle_deadline: None,
            fetch_tx,
            fetch_rx,
            fetch_seq: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }

    pub fn graph_stage(&self) -> GraphStage {
        self.graph_stage
    }

    /// Drive the page until it unloads or the event stream ends.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HostEvent>) -> Result<SessionStats> {
        self.load();

        loop {
            let settle = self.settle_deadline;

            tokio::select! {
                event = events.recv() => match event {
                    Some(HostEvent::Unload) | None => break,
                    Some(event) => self.handle_event(event)?,
                },
                Some(outcome) = self.fetch_rx.recv() => self.on_fetch_complete(outcome),
                _ = sleep_until(settle.unwrap_or_else(Instant::now)), if settle.is_some() => {
                    debug!("Settle delay elapsed");
                    self.promote_graph();
                }
            }
        }

        self.stats.deliveries = self.messenger.sent();
        info!(
            "Session ended: {} deploy(s), {} refresh(es), {} fetch(es) ({} failed), {} deliveries",
            self.stats.deploys,
            self.stats.refreshes,
            self.stats.fetches_started,
            self.stats.fetches_failed,
            self.stats.deliveries
        );
        Ok(self.stats)
    }

    /// Page load: read the flag, show the configuration form, route the rest.
    fn load(&mut self) {
        self.state = self.store.read();
        info!("Page loaded, deployment state: {}", self.state);

        let config_route = FrameRoute::new(FrameId::Config, self.config.documents.config.clone());
        self.navigate(&config_route);
        self.apply_route();
    }

    fn handle_event(&mut self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::FrameLoaded(FrameId::Config) => match self.deploy.wire(self.host.as_ref()) {
                Ok(_) => {}
                Err(Error::MissingFrameTarget(frame)) => {
                    debug!("Cannot wire deploy control, {} is not present", frame)
                }
                Err(e) => return Err(e),
            },
            HostEvent::FrameLoaded(frame) => debug!("{} finished loading", frame),
            HostEvent::ControlActivated { frame, control } => {
                if self.deploy.matches(frame, &control) {
                    self.on_deploy();
                } else {
                    debug!("Ignoring activation of '{}' in {}", control, frame);
                }
            }
            HostEvent::Message(envelope) => {
                if let Some(message) = self.messenger.accept(&envelope) {
                    self.on_message(message, envelope.source);
                }
            }
            HostEvent::Unload => {}
        }
        Ok(())
    }

    fn on_message(&mut self, message: Message, source: Option<FrameId>) {
        match message {
            Message::ResultsFrameReady => {
                debug!("Results frame ready");
                self.messenger.on_results_ready();
            }
            // Only the loading document in the graph frame may end the loading
            // stage; it announces once the visualization it covers for is set up.
            Message::GraphFrameReady => {
                if source != Some(FrameId::Graph) {
                    debug!("Ignoring graph handshake from {:?}", source);
                } else if self.graph_stage == GraphStage::Loading {
                    debug!("Graph frame handshake received");
                    self.promote_graph();
                } else {
                    debug!("Ignoring graph handshake in stage {:?}", self.graph_stage);
                }
            }
            Message::RefreshData => {
                if self.state.is_deployed() {
                    self.stats.refreshes += 1;
                    info!("Refresh requested");
                    self.start_fetch(FetchTrigger::Refresh);
                } else {
                    debug!("Ignoring refresh request before deploy");
                }
            }
            Message::UpdateResults(_) => debug!("Ignoring updateResults addressed to the parent"),
        }
    }

    fn on_deploy(&mut self) {
        self.stats.deploys += 1;
        self.state = self.deploy.commit(&self.store);
        info!("Deploy requested, state is now {}", self.state);
        self.apply_route();
    }

    fn apply_route(&mut self) {
        let plan = self.router.route(self.state);

        for route in &plan.routes {
            self.navigate(route);
        }
        if plan.target(FrameId::Results).is_some() {
            self.messenger.results_routed();
        }

        self.graph_stage = plan.graph_stage;
        self.settle_deadline = match plan.graph_stage {
            GraphStage::Loading => self.config.settle_delay.map(|d| Instant::now() + d),
            _ => None,
        };

        if plan.fetch {
            self.start_fetch(FetchTrigger::Deploy);
        }
    }

    fn promote_graph(&mut self) {
        self.settle_deadline = None;
        if self.graph_stage != GraphStage::Loading {
            return;
        }
        let route = self.router.promote();
        self.navigate(&route);
        self.graph_stage = GraphStage::Visualization;
    }

    fn navigate(&self, route: &FrameRoute) {
        match self.host.navigate(route.frame, &route.url) {
            Ok(()) => debug!("{} -> {}", route.frame, route.url),
            Err(Error::MissingFrameTarget(frame)) => debug!("Skipping route, {} is not present", frame),
            Err(e) => warn!("Failed to route {}: {}", route.frame, e),
        }
    }

    fn start_fetch(&mut self, trigger: FetchTrigger) {
        self.fetch_seq += 1;
        self.stats.fetches_started += 1;

        let seq = self.fetch_seq;
        let source = self.source.clone();
        let tx = self.fetch_tx.clone();
        debug!("Fetch #{} ({:?}) from {}", seq, trigger, source.describe());

        tokio::spawn(async move {
            let result = source.fetch_dataset().await;
            // The page may be gone by now; nothing left to tell.
            let _ = tx.send(FetchOutcome {
                seq,
                trigger,
                result,
            });
        });
    }

    fn on_fetch_complete(&mut self, outcome: FetchOutcome) {
        let payload = match outcome.result {
            Ok(dataset) => {
                for issue in dataset.issues() {
                    warn!("Fetch #{}: {}", outcome.seq, issue);
                }
                info!(
                    "Fetch #{} ({:?}) resolved with {} nodes",
                    outcome.seq,
                    outcome.trigger,
                    dataset.nodes.len()
                );
                Some(dataset)
            }
            Err(e) => {
                self.stats.fetches_failed += 1;
                if e.is_not_ready() {
                    info!("Fetch #{}: graph data not ready yet ({})", outcome.seq, e);
                } else {
                    warn!("Fetch #{} failed [{}]: {}", outcome.seq, e.kind(), e);
                }
                None
            }
        };

        if outcome.seq < self.fetch_seq {
            debug!("Fetch #{} finished after a newer fetch was started", outcome.seq);
        }
        self.messenger.deliver(payload);
    }
}
