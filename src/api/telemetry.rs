//! Request and write metrics for the API surfaces.

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;
use std::time::Instant;
use tonic::Code;
use tracing::{info_span, Instrument};

/// Count, latency and failures for one request protocol.
struct RequestInstruments {
    count: Counter<u64>,
    duration_seconds: Histogram<f64>,
    errors: Counter<u64>,
}

impl RequestInstruments {
    fn new(meter: &Meter, prefix: &str, protocol: &str) -> Self {
        Self {
            count: meter
                .u64_counter(format!("{prefix}.request.count"))
                .with_description(format!("{protocol} requests handled"))
                .init(),
            duration_seconds: meter
                .f64_histogram(format!("{prefix}.request.duration"))
                .with_description(format!("{protocol} request duration"))
                .with_unit("s")
                .init(),
            errors: meter
                .u64_counter(format!("{prefix}.request.errors"))
                .with_description(format!("{protocol} requests that failed"))
                .init(),
        }
    }

    fn record(&self, attrs: &[KeyValue], duration_seconds: f64, failed: bool) {
        self.count.add(1, attrs);
        self.duration_seconds.record(duration_seconds, attrs);
        if failed {
            self.errors.add(1, attrs);
        }
    }
}

struct ApiInstruments {
    http: RequestInstruments,
    grpc: RequestInstruments,
    points_written: Counter<u64>,
    series_created: Counter<u64>,
    write_errors: Counter<u64>,
}

fn instruments() -> &'static ApiInstruments {
    static INSTRUMENTS: OnceLock<ApiInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("seriescount.api");
        ApiInstruments {
            http: RequestInstruments::new(&meter, "http.server", "HTTP"),
            grpc: RequestInstruments::new(&meter, "rpc.server", "gRPC"),
            points_written: meter
                .u64_counter("seriescount.write.points")
                .with_description("Points accepted by the write endpoint")
                .init(),
            series_created: meter
                .u64_counter("seriescount.write.series_created")
                .with_description("Series first seen by the write endpoint")
                .init(),
            write_errors: meter
                .u64_counter("seriescount.write.errors")
                .with_description("Rejected write batches")
                .init(),
        }
    })
}

/// Middleware recording request count, latency and 4xx/5xx responses.
pub async fn http_observability_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let span = info_span!(
        "http.request",
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route
    );
    let response = next.run(req).instrument(span).await;
    let status = response.status().as_u16();

    let attrs = [
        KeyValue::new("http.request.method", method),
        KeyValue::new("http.route", route),
        KeyValue::new("http.response.status_code", status as i64),
    ];
    instruments()
        .http
        .record(&attrs, start.elapsed().as_secs_f64(), status >= 400);

    response
}

pub fn record_grpc_request(service: &str, method: &str, code: Code, duration_seconds: f64) {
    let attrs = [
        KeyValue::new("rpc.system", "grpc"),
        KeyValue::new("rpc.service", service.to_string()),
        KeyValue::new("rpc.method", method.to_string()),
        KeyValue::new("rpc.grpc.status_code", code as i64),
    ];
    instruments()
        .grpc
        .record(&attrs, duration_seconds, code != Code::Ok);
}

/// Record the outcome of one write batch.
pub fn record_write(points: u64, new_series: u64, failed: bool) {
    let instruments = instruments();
    if failed {
        instruments.write_errors.add(1, &[]);
        return;
    }
    instruments.points_written.add(points, &[]);
    instruments.series_created.add(new_series, &[]);
}
