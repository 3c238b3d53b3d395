// End-to-end tests for the parent page orchestration

use framewire_core::host::{Envelope, FrameHost};
use framewire_core::message::Message;
use framewire_core::messenger::OriginPolicy;
use framewire_core::orchestrator::{Orchestrator, SessionStats};
use framewire_core::router::{FrameDocuments, FrameId};
use framewire_core::sim::{ResultsView, SimOptions, SimulatedFrames};
use framewire_core::state::{DeploymentState, FlagStore};
use framewire_core::{OrchestratorConfig, Result};
use framewire_fetch::{DatasetSource, GraphDataset, GraphFetcher, GraphNode};
use scripted::ScriptedSource;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const WAIT: Duration = Duration::from_secs(5);

mod scripted {
    use framewire_fetch::{BoxFuture, DatasetSource, FetchError, GraphDataset};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Step {
        Data(GraphDataset),
        NotReady(u16),
    }

    /// Serves a fixed script of fetch results, repeating the last one.
    pub struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DatasetSource for ScriptedSource {
        fn fetch_dataset(&self) -> BoxFuture<'_, Result<GraphDataset, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = {
                let mut steps = self.steps.lock().unwrap();
                let step = if steps.len() > 1 {
                    steps.pop_front()
                } else {
                    steps.front().map(|s| match s {
                        Step::Data(d) => Step::Data(d.clone()),
                        Step::NotReady(code) => Step::NotReady(*code),
                    })
                };
                match step {
                    Some(Step::Data(d)) => Ok(d),
                    Some(Step::NotReady(status)) => Err(FetchError::NotReady {
                        status,
                        body: String::new(),
                    }),
                    None => Err(FetchError::Other("script exhausted".to_string())),
                }
            };
            Box::pin(async move { result })
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }
}

use scripted::Step;

fn documents() -> FrameDocuments {
    FrameDocuments::new(&Url::parse("http://127.0.0.1:8080/app/").unwrap()).unwrap()
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig::new(documents()).with_settle_delay(Some(Duration::from_millis(20)))
}

fn second_dataset() -> GraphDataset {
    GraphDataset {
        nodes: vec![GraphNode::topic("Z", 9.0)],
        edges: vec![],
    }
}

struct Session {
    frames: Arc<SimulatedFrames>,
    handle: JoinHandle<Result<SessionStats>>,
}

impl Session {
    fn start(
        config: OrchestratorConfig,
        store: FlagStore,
        options: SimOptions,
        source: Arc<dyn DatasetSource>,
    ) -> Self {
        let (frames, events) = SimulatedFrames::new(options);
        let frames = Arc::new(frames);
        let host: Arc<dyn FrameHost> = frames.clone();
        let orchestrator = Orchestrator::new(config, store, host, source);
        let handle = tokio::spawn(orchestrator.run(events));
        Self { frames, handle }
    }

    async fn deploy(&self) {
        assert!(
            self.frames
                .wait_for_binding(FrameId::Config, "deployBtn", WAIT)
                .await,
            "deploy control was never bound"
        );
        assert!(self.frames.click(FrameId::Config, "deployBtn"));
    }

    async fn wait_until<F: Fn(&SimulatedFrames) -> bool>(&self, condition: F) {
        let frames = self.frames.clone();
        let polled = tokio::time::timeout(WAIT, async move {
            while !condition(&frames) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(polled.is_ok(), "condition not reached in time");
    }

    async fn wait_for_view(&self, expected: ResultsView) {
        let reached = self.frames.wait_for_view(WAIT, |v| *v == expected).await;
        assert!(reached.is_some(), "results view never became {:?}", expected);
    }

    async fn finish(self) -> (Arc<SimulatedFrames>, SessionStats) {
        self.frames.unload();
        let stats = self.handle.await.unwrap().unwrap();
        (self.frames, stats)
    }
}

fn populated_count(frames: &SimulatedFrames) -> usize {
    frames.deliveries().iter().filter(|d| d.is_some()).count()
}

// ============================================================================
// First load, nothing deployed
// ============================================================================

#[tokio::test]
async fn test_first_load_shows_placeholders_without_fetching() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.wait_for_view(ResultsView::Loading).await;
    let (frames, stats) = session.finish().await;

    let docs = documents();
    assert_eq!(frames.current(FrameId::Config), Some(docs.config));
    assert_eq!(frames.navigations_of(FrameId::Graph), vec![docs.graph_placeholder]);
    assert_eq!(frames.navigations_of(FrameId::Results), vec![docs.results]);
    assert_eq!(frames.deliveries(), vec![None]);
    assert_eq!(source.calls(), 0);
    assert_eq!(stats.fetches_started, 0);
}

// ============================================================================
// Deploy with a ready server
// ============================================================================

#[tokio::test]
async fn test_deploy_fetches_and_delivers_dataset_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(GraphDataset::sample()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("framewire.db");
    let fetcher = GraphFetcher::for_server(&Url::parse(&mock_server.uri()).unwrap()).unwrap();
    let options = SimOptions {
        graph_handshake: false,
        ..SimOptions::default()
    };

    let session = Session::start(config(), FlagStore::open(&db).unwrap(), options, Arc::new(fetcher));
    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;

    let docs = documents();
    let visualization = docs.visualization.clone();
    session
        .wait_until(|f| f.current(FrameId::Graph) == Some(visualization.clone()))
        .await;

    let (frames, stats) = session.finish().await;

    assert_eq!(
        frames.navigations_of(FrameId::Graph),
        vec![docs.graph_placeholder, docs.graph_loading, docs.visualization]
    );
    assert_eq!(populated_count(&frames), 1);
    assert_eq!(
        frames.deliveries().last(),
        Some(&Some(GraphDataset::sample()))
    );
    assert_eq!(stats.deploys, 1);
    assert_eq!(stats.fetches_started, 1);
    assert_eq!(stats.fetches_failed, 0);

    assert_eq!(FlagStore::open(&db).unwrap().read(), DeploymentState::Deployed);
    mock_server.verify().await;
}

// ============================================================================
// Deploy while the server is not ready
// ============================================================================

#[tokio::test]
async fn test_deploy_against_unavailable_server_ends_loading() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph-data"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let fetcher = GraphFetcher::for_server(&Url::parse(&mock_server.uri()).unwrap()).unwrap();
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        Arc::new(fetcher),
    );

    session.deploy().await;
    // initial readiness, post-deploy readiness, failed fetch
    session.wait_until(|f| f.deliveries().len() >= 3).await;

    let (frames, stats) = session.finish().await;

    assert!(frames.deliveries().iter().all(|d| d.is_none()));
    assert_eq!(frames.view(), ResultsView::Loading);
    assert_eq!(stats.fetches_failed, 1);
}

#[tokio::test]
async fn test_not_ready_maps_to_null_delivery() {
    let source = Arc::new(ScriptedSource::new(vec![Step::NotReady(404)]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session.wait_until(|f| f.deliveries().len() >= 3).await;
    let (frames, _) = session.finish().await;

    assert_eq!(frames.deliveries(), vec![None, None, None]);
    assert_eq!(source.calls(), 1);
}

// ============================================================================
// Refresh after deploy
// ============================================================================

#[tokio::test]
async fn test_refresh_fetches_again_and_delivers_fresh_data() {
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Data(GraphDataset::sample()),
        Step::Data(second_dataset()),
    ]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;
    let before = session.frames.deliveries().len();

    session.frames.request_refresh();
    session
        .wait_for_view(ResultsView::Populated(second_dataset()))
        .await;

    let (frames, stats) = session.finish().await;

    assert_eq!(source.calls(), 2);
    assert_eq!(frames.deliveries().len(), before + 1);
    assert_eq!(populated_count(&frames), 2);
    assert_eq!(stats.refreshes, 1);
    assert_eq!(stats.deploys, 1);
}

#[tokio::test]
async fn test_failed_refresh_falls_back_to_loading() {
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Data(GraphDataset::sample()),
        Step::NotReady(500),
    ]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;

    session.frames.request_refresh();
    session.wait_for_view(ResultsView::Loading).await;

    let (_, stats) = session.finish().await;
    assert_eq!(source.calls(), 2);
    assert_eq!(stats.fetches_failed, 1);
}

#[tokio::test]
async fn test_refresh_before_deploy_is_ignored() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.wait_for_view(ResultsView::Loading).await;
    session.frames.request_refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (frames, stats) = session.finish().await;
    assert_eq!(source.calls(), 0);
    assert_eq!(stats.refreshes, 0);
    assert_eq!(frames.deliveries(), vec![None]);
}

// ============================================================================
// Deploy transition details
// ============================================================================

#[tokio::test]
async fn test_reload_after_deploy_fetches_immediately() {
    let store = FlagStore::in_memory().unwrap();
    store.write(DeploymentState::Deployed).unwrap();
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));

    let session = Session::start(config(), store, SimOptions::default(), source.clone());
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;
    let (frames, stats) = session.finish().await;

    assert_eq!(source.calls(), 1);
    assert_eq!(stats.deploys, 0);
    assert_eq!(
        frames.navigations_of(FrameId::Graph).first(),
        Some(&documents().graph_loading)
    );
}

#[tokio::test]
async fn test_deploying_twice_fetches_twice() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;
    session.deploy().await;
    session.wait_until(|f| populated_count(f) == 2).await;

    let (frames, stats) = session.finish().await;

    assert_eq!(source.calls(), 2);
    assert_eq!(stats.deploys, 2);
    assert_eq!(frames.navigations_of(FrameId::Results).len(), 3);
    assert_eq!(frames.view(), ResultsView::Populated(GraphDataset::sample()));
}

#[tokio::test]
async fn test_graph_handshake_promotes_without_timer() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let session = Session::start(
        config().with_settle_delay(None),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source,
    );

    session.deploy().await;
    let visualization = documents().visualization;
    session
        .wait_until(|f| f.current(FrameId::Graph) == Some(visualization.clone()))
        .await;
    session.finish().await;
}

#[tokio::test]
async fn test_graph_stays_loading_without_handshake_or_timer() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let options = SimOptions {
        graph_handshake: false,
        ..SimOptions::default()
    };
    let session = Session::start(
        config().with_settle_delay(None),
        FlagStore::in_memory().unwrap(),
        options,
        source,
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (frames, _) = session.finish().await;
    assert_eq!(frames.current(FrameId::Graph), Some(documents().graph_loading));
}

#[tokio::test]
async fn test_graph_handshake_only_counts_from_graph_frame() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let options = SimOptions {
        graph_handshake: false,
        ..SimOptions::default()
    };
    let session = Session::start(
        config().with_settle_delay(None),
        FlagStore::in_memory().unwrap(),
        options,
        source,
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;

    session.frames.inject(Envelope::new(
        "http://127.0.0.1:8080",
        Some(FrameId::Results),
        &Message::GraphFrameReady,
    ));
    session.frames.inject(Envelope::new(
        "http://127.0.0.1:8080",
        None,
        &Message::GraphFrameReady,
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.frames.current(FrameId::Graph), Some(documents().graph_loading));

    session.frames.inject(Envelope::new(
        "http://127.0.0.1:8080",
        Some(FrameId::Graph),
        &Message::GraphFrameReady,
    ));
    let visualization = documents().visualization;
    session
        .wait_until(|f| f.current(FrameId::Graph) == Some(visualization.clone()))
        .await;
    session.finish().await;
}

#[tokio::test]
async fn test_results_reload_gets_current_dataset_again() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let session = Session::start(
        config(),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;
    let before = session.frames.deliveries().len();

    // The results document reloads without the parent routing it.
    session.frames.inject(Envelope::new(
        "http://127.0.0.1:8080",
        Some(FrameId::Results),
        &Message::ResultsFrameReady,
    ));
    session.wait_until(|f| f.deliveries().len() >= before + 2).await;

    let (frames, _) = session.finish().await;
    assert_eq!(
        frames.deliveries()[before..].to_vec(),
        vec![None, Some(GraphDataset::sample())]
    );
    assert_eq!(frames.view(), ResultsView::Populated(GraphDataset::sample()));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_missing_config_control_disables_deploy() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let options = SimOptions {
        config_controls: vec![],
        ..SimOptions::default()
    };
    let session = Session::start(config(), FlagStore::in_memory().unwrap(), options, source.clone());

    session.wait_for_view(ResultsView::Loading).await;
    assert!(!session.frames.click(FrameId::Config, "deployBtn"));

    let (_, stats) = session.finish().await;
    assert_eq!(stats.deploys, 0);
    assert_eq!(source.calls(), 0);
}

// ============================================================================
// Partial failure and trust
// ============================================================================

#[tokio::test]
async fn test_missing_results_frame_is_not_fatal() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let options = SimOptions {
        missing: vec![FrameId::Results],
        ..SimOptions::default()
    };
    let session = Session::start(config(), FlagStore::in_memory().unwrap(), options, source.clone());

    session.deploy().await;
    let s = source.clone();
    session.wait_until(move |_| s.calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (frames, stats) = session.finish().await;
    assert!(frames.deliveries().is_empty());
    assert_eq!(stats.deliveries, 0);
    assert_eq!(stats.fetches_started, 1);
}

#[tokio::test]
async fn test_allow_list_ignores_foreign_refresh() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Data(GraphDataset::sample())]));
    let policy = OriginPolicy::parse_list(&["http://127.0.0.1:8080"]).unwrap();
    let session = Session::start(
        config().with_origins(policy),
        FlagStore::in_memory().unwrap(),
        SimOptions::default(),
        source.clone(),
    );

    session.deploy().await;
    session
        .wait_for_view(ResultsView::Populated(GraphDataset::sample()))
        .await;

    session.frames.inject(Envelope::new(
        "https://evil.example",
        None,
        &Message::RefreshData,
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (frames, stats) = session.finish().await;
    assert_eq!(source.calls(), 1);
    assert_eq!(stats.refreshes, 0);
    assert!(
        frames
            .post_origins()
            .iter()
            .all(|o| o == "http://127.0.0.1:8080")
    );
}
