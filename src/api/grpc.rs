//! gRPC storage service answering series cardinality queries.

use crate::api::telemetry::record_grpc_request;
use crate::proto::service::storage_server::{Storage, StorageServer};
use crate::proto::service::SERVICE_NAME;
use crate::proto::{Int64ValuesResponse, ReadSeriesCardinalityRequest};
use crate::query::CardinalityEngine;
use crate::{Error, Result};

use futures::Stream;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status};
use tracing::{debug, info_span, Instrument};

type GrpcResult<T> = std::result::Result<T, Status>;
type GrpcStream<T> = Pin<Box<dyn Stream<Item = GrpcResult<T>> + Send + 'static>>;

const METHOD_READ_SERIES_CARDINALITY: &str = "ReadSeriesCardinality";

fn record_grpc_result<T>(
    service: &'static str,
    method: &'static str,
    start: Instant,
    result: &GrpcResult<Response<T>>,
) {
    let code = match result {
        Ok(_) => Code::Ok,
        Err(status) => status.code(),
    };
    record_grpc_request(service, method, code, start.elapsed().as_secs_f64());
}

/// Build the tonic service wrapper with message size limits applied.
pub fn storage_service(
    engine: Arc<CardinalityEngine>,
    max_message_size: usize,
) -> StorageServer<CardinalityGrpcService> {
    StorageServer::new(CardinalityGrpcService::new(engine))
        .max_decoding_message_size(max_message_size)
        .max_encoding_message_size(max_message_size)
}

/// Run the storage gRPC server on `addr` until `shutdown` flips.
pub async fn run_grpc_server(
    addr: SocketAddr,
    engine: Arc<CardinalityEngine>,
    max_message_size: usize,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    Server::builder()
        .add_service(storage_service(engine, max_message_size))
        .serve_with_shutdown(addr, wait_for_shutdown(shutdown))
        .await
        .map_err(|e| Error::Internal(format!("Storage gRPC server error: {e}")))?;

    Ok(())
}

/// Run the storage gRPC server on an already bound listener.
pub async fn run_grpc_server_on(
    listener: TcpListener,
    engine: Arc<CardinalityEngine>,
    max_message_size: usize,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    Server::builder()
        .add_service(storage_service(engine, max_message_size))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            wait_for_shutdown(shutdown),
        )
        .await
        .map_err(|e| Error::Internal(format!("Storage gRPC server error: {e}")))?;

    Ok(())
}

pub(crate) async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
}

/// `seriescount.storage.v1.Storage` implementation backed by a
/// [`CardinalityEngine`].
pub struct CardinalityGrpcService {
    engine: Arc<CardinalityEngine>,
}

impl CardinalityGrpcService {
    pub fn new(engine: Arc<CardinalityEngine>) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl Storage for CardinalityGrpcService {
    type ReadSeriesCardinalityStream = GrpcStream<Int64ValuesResponse>;

    async fn read_series_cardinality(
        &self,
        request: Request<ReadSeriesCardinalityRequest>,
    ) -> GrpcResult<Response<Self::ReadSeriesCardinalityStream>> {
        let start = Instant::now();
        let span = info_span!(
            "grpc.request",
            otel.kind = "server",
            rpc.system = "grpc",
            rpc.service = SERVICE_NAME,
            rpc.method = METHOD_READ_SERIES_CARDINALITY
        );

        let result = async {
            let response = self
                .engine
                .read_series_cardinality_proto(request.into_inner())
                .map_err(|e| {
                    debug!(error = %e, "Cardinality request rejected");
                    Status::from(e)
                })?;

            let frame = Int64ValuesResponse::from(response);
            let out: Self::ReadSeriesCardinalityStream =
                Box::pin(futures::stream::iter(vec![Ok::<Int64ValuesResponse, Status>(
                    frame,
                )]));
            Ok(Response::new(out))
        }
        .instrument(span)
        .await;

        record_grpc_result(SERVICE_NAME, METHOD_READ_SERIES_CARDINALITY, start, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::CardinalitySource;
    use crate::proto::{ReadSource, TimestampRange};
    use crate::query::QueryConfig;
    use crate::storage::{BucketKey, DatabaseStore};
    use futures::StreamExt;

    fn service() -> CardinalityGrpcService {
        let store = Arc::new(DatabaseStore::new());
        store
            .write_lines(BucketKey::new(1, 1), "cpu,host=a v=1 5\ncpu,host=b v=1 6", 0)
            .unwrap();
        CardinalityGrpcService::new(Arc::new(CardinalityEngine::new(QueryConfig::default(), store)))
    }

    #[tokio::test]
    async fn streams_a_single_frame() {
        let request = ReadSeriesCardinalityRequest {
            read_series_cardinality_source: Some(
                CardinalitySource::Read(ReadSource::new(1, 1)).to_any(),
            ),
            range: Some(TimestampRange::new(0, 10)),
            predicate: None,
        };
        let response = service()
            .read_series_cardinality(Request::new(request))
            .await
            .unwrap();
        let frames: Vec<_> = response.into_inner().collect().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().values, vec![2]);
    }

    #[tokio::test]
    async fn missing_range_is_invalid_argument() {
        let request = ReadSeriesCardinalityRequest {
            read_series_cardinality_source: Some(
                CardinalitySource::Read(ReadSource::new(1, 1)).to_any(),
            ),
            range: None,
            predicate: None,
        };
        let status = service()
            .read_series_cardinality(Request::new(request))
            .await
            .err()
            .unwrap();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
