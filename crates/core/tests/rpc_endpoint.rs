//! End-to-end tests over HTTP: name server, worker node, worker client and
//! a mocked run ledger.

#![cfg(unix)]

use rn_core::node::Node;
use rn_core::registry::{serve_name_server, RegistryClient, RegistryError};
use rn_core::rpc::{ClientError, ScriptReply, WorkerClient};
use rn_protocol::{RunScriptRequest, WorkerConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Cluster {
    registry: RegistryClient,
    registry_shutdown: CancellationToken,
    worker_shutdown: CancellationToken,
    worker: JoinHandle<Result<(), rn_core::node::ServeError>>,
    _work_root: tempfile::TempDir,
}

impl Cluster {
    fn stop(&self) {
        self.worker_shutdown.cancel();
        self.registry_shutdown.cancel();
    }
}

async fn start_cluster(name: &str, ledger_url: &str) -> Cluster {
    let registry_shutdown = CancellationToken::new();
    let worker_shutdown = CancellationToken::new();

    let registry_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let registry_url = format!("http://{}", registry_listener.local_addr().unwrap());
    tokio::spawn(serve_name_server(registry_listener, registry_shutdown.clone()));

    let worker_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let worker_addr = worker_listener.local_addr().unwrap();
    let work_root = tempfile::tempdir().unwrap();

    let config = WorkerConfig {
        name: Some(name.to_string()),
        listen: worker_addr,
        advertise_url: Some(format!("http://{worker_addr}")),
        registry_url: registry_url.clone(),
        ledger_url: ledger_url.to_string(),
        work_root: work_root.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let node = Node::new(config).unwrap();
    let worker = tokio::spawn(node.serve_on(worker_listener, worker_shutdown.clone()));

    let registry = RegistryClient::new(&registry_url).unwrap();
    tokio::time::timeout(TIMEOUT, async {
        while registry.lookup(name).await.is_err() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("worker never registered");

    Cluster {
        registry,
        registry_shutdown,
        worker_shutdown,
        worker,
        _work_root: work_root,
    }
}

fn script(lines: &[&str], run_id: &str, wait: bool) -> RunScriptRequest {
    RunScriptRequest {
        lines: lines.iter().map(|line| line.to_string()).collect(),
        project: "soundcast".to_string(),
        series: "AB".to_string(),
        run_id: Some(run_id.to_string()),
        wait,
    }
}

#[tokio::test]
async fn test_failing_script_is_reported_to_ledger() {
    let ledger = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runlog/42"))
        .and(query_param("status", "1"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&ledger)
        .await;

    let cluster = start_cluster("modelsrv1", &ledger.uri()).await;
    let client = WorkerClient::connect(&cluster.registry, "modelsrv1")
        .await
        .unwrap();

    let reply = client
        .run_script(&script(&["echo A", "exit 1", "echo B"], "42", true))
        .await
        .unwrap();
    match reply {
        ScriptReply::Finished(outcome) => {
            assert_eq!(outcome.exit_code, 1);
            assert_eq!(outcome.steps_run, 2);
        }
        other => panic!("Expected a finished script, got {other:?}"),
    }

    let status = client.status().await.unwrap();
    assert_eq!(status.name, "modelsrv1");
    assert_eq!(status.exit_code, 1);
    assert!(!status.busy);
    assert!(status.cwd.unwrap().ends_with("soundcast/AB"));

    ledger.verify().await;
    cluster.stop();
}

#[tokio::test]
async fn test_busy_worker_rejects_second_caller() {
    let ledger = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ledger)
        .await;

    let cluster = start_cluster("modelsrv2", &ledger.uri()).await;
    let client = WorkerClient::connect(&cluster.registry, "modelsrv2")
        .await
        .unwrap();

    let reply = client
        .run_script(&script(&["sleep 5"], "1", false))
        .await
        .unwrap();
    assert!(matches!(reply, ScriptReply::Accepted(ref ticket) if ticket.steps == 1));
    assert!(client.is_busy().await.unwrap());

    let err = client
        .run_script(&script(&["echo B"], "2", false))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::WorkerBusy(_)));

    assert!(client.kill().await.unwrap());
    tokio::time::timeout(TIMEOUT, async {
        while client.is_busy().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("worker stayed busy after kill");

    assert_eq!(client.status().await.unwrap().exit_code, 137);
    cluster.stop();
}

#[tokio::test]
async fn test_shutdown_unregisters_worker() {
    let cluster = start_cluster("modelsrv3", "").await;
    assert_eq!(cluster.registry.list().await.unwrap().len(), 1);

    cluster.worker_shutdown.cancel();
    tokio::time::timeout(TIMEOUT, cluster.worker)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();

    let err = cluster.registry.lookup("modelsrv3").await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
    assert!(cluster.registry.list().await.unwrap().is_empty());
    cluster.registry_shutdown.cancel();
}

#[tokio::test]
async fn test_unknown_worker_name() {
    let cluster = start_cluster("modelsrv4", "").await;

    let err = WorkerClient::connect(&cluster.registry, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Registry(RegistryError::NotFound { .. })
    ));
    cluster.stop();
}

#[tokio::test]
async fn test_shutdown_kills_and_reports_running_job() {
    let ledger = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runlog/77"))
        .and(query_param("status", "137"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&ledger)
        .await;

    let cluster = start_cluster("modelsrv5", &ledger.uri()).await;
    let client = WorkerClient::connect(&cluster.registry, "modelsrv5")
        .await
        .unwrap();

    let reply = client
        .run_script(&script(&["sleep 30"], "77", false))
        .await
        .unwrap();
    assert!(matches!(reply, ScriptReply::Accepted(_)));

    cluster.worker_shutdown.cancel();
    tokio::time::timeout(TIMEOUT, cluster.worker)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();

    ledger.verify().await;
    assert!(cluster.registry.list().await.unwrap().is_empty());
    cluster.registry_shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_releases_waiting_caller() {
    let ledger = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runlog/78"))
        .and(query_param("status", "137"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&ledger)
        .await;

    let cluster = start_cluster("modelsrv6", &ledger.uri()).await;
    let client = WorkerClient::connect(&cluster.registry, "modelsrv6")
        .await
        .unwrap();

    let waiting = {
        let client = client.clone();
        tokio::spawn(async move { client.run_script(&script(&["sleep 30"], "78", true)).await })
    };
    tokio::time::timeout(TIMEOUT, async {
        while !client.is_busy().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job never started");

    cluster.worker_shutdown.cancel();
    tokio::time::timeout(TIMEOUT, cluster.worker)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();

    match waiting.await.unwrap().unwrap() {
        ScriptReply::Finished(outcome) => assert_eq!(outcome.exit_code, 137),
        other => panic!("Expected a finished script, got {other:?}"),
    }
    ledger.verify().await;
    cluster.registry_shutdown.cancel();
}
