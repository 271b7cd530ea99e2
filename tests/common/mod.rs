//! In-process server harness
//!
//! Binds HTTP and gRPC on ephemeral ports, serves a fresh store, and shuts
//! both servers down on drop.

#![allow(dead_code)]

use seriescount::api::{self, ApiServerConfig};
use seriescount::proto::service::storage_client::StorageClient;
use seriescount::query::{CardinalityEngine, QueryConfig};
use seriescount::storage::DatabaseStore;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

pub struct TestServer {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub engine: Arc<CardinalityEngine>,
    pub http: reqwest::Client,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<seriescount::Result<()>>>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(QueryConfig::default()).await
    }

    pub async fn start_with(query: QueryConfig) -> Result<Self> {
        let store = Arc::new(DatabaseStore::new());
        let engine = Arc::new(CardinalityEngine::new(query, store));

        let http_listener = TcpListener::bind("127.0.0.1:0").await?;
        let grpc_listener = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = http_listener.local_addr()?;
        let grpc_addr = grpc_listener.local_addr()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let router = api::build_http_router(engine.clone(), &ApiServerConfig::default());

        let tasks = vec![
            tokio::spawn(api::serve_http(http_listener, router, shutdown_rx.clone())),
            tokio::spawn(api::grpc::run_grpc_server_on(
                grpc_listener,
                engine.clone(),
                MAX_MESSAGE_SIZE,
                shutdown_rx,
            )),
        ];

        Ok(Self {
            http_addr,
            grpc_addr,
            engine,
            http: reqwest::Client::new(),
            shutdown,
            tasks,
        })
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    pub async fn grpc_client(&self) -> Result<StorageClient<Channel>> {
        Ok(StorageClient::connect(format!("http://{}", self.grpc_addr)).await?)
    }

    /// Write line protocol through the HTTP API.
    pub async fn write(&self, org: u64, bucket: u64, body: &str) -> Result<reqwest::StatusCode> {
        let response = self
            .http
            .post(self.http_url(&format!("/api/v1/write?org={org}&bucket={bucket}")))
            .body(body.to_string())
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn stop(mut self) -> Result<()> {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            task.await??;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Sample data: 3 cpu series and 2 mem series across two hosts.
pub const SAMPLE_LINES: &str = "\
cpu,host=a,region=west usage=1.5 100
cpu,host=b,region=west usage=2.5 200
cpu,host=c,region=east usage=3.5 300
mem,host=a free=10i 150
mem,host=b free=20i 250
";
