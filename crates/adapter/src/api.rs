//! HTTP API for health checks, Prometheus metrics and metric ingestion

use adapter_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{AdapterMetrics, StructuredLogger},
    provider::InMemoryProvider,
    AdapterError, ErrorClass, GroupResource, LabelSet, MetricRequest, ObjectCoordinate,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AdapterMetrics,
    pub provider: Arc<InMemoryProvider>,
    pub logger: StructuredLogger,
    pub enable_ingestion: bool,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AdapterMetrics,
        provider: Arc<InMemoryProvider>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            provider,
            logger,
            enable_ingestion: true,
        }
    }

    pub fn with_ingestion(mut self, enable_ingestion: bool) -> Self {
        self.enable_ingestion = enable_ingestion;
        self
    }
}

/// Errors surfaced to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    Adapter(AdapterError),
    BadRequest(String),
    UnknownRoute(String),
}

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        ApiError::Adapter(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, class, message) = match self {
            ApiError::Adapter(err) => {
                let status = match err.class() {
                    ErrorClass::NotFound => StatusCode::NOT_FOUND,
                    ErrorClass::InvalidSelector => StatusCode::BAD_REQUEST,
                    ErrorClass::Ambiguous => StatusCode::CONFLICT,
                    ErrorClass::Transient => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.class().as_str(), err.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::UnknownRoute(path) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("no write route matches {:?}", path),
            ),
        };

        (status, Json(json!({ "error": message, "class": class }))).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Serving from the last snapshot
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Where a write lands, decoded from the path under `/write-metrics/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub metric: String,
}

impl WriteTarget {
    /// Accepts
    /// `namespaces/{namespace}/{resource}/{name}/{metric}`,
    /// `{resource}/{name}/metrics/{metric}` and `{resource}/{name}/{metric}`
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        let (namespace, resource, name, metric) = match segments.as_slice() {
            ["namespaces", namespace, resource, name, metric] => (*namespace, *resource, *name, *metric),
            [resource, name, "metrics", metric] => ("", *resource, *name, *metric),
            [resource, name, metric] => ("", *resource, *name, *metric),
            _ => return None,
        };

        Some(Self {
            resource: resource.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            metric: metric.to_string(),
        })
    }

    /// Namespaced when a namespace is given or the object is itself a namespace
    pub fn namespaced(&self) -> bool {
        !self.namespace.is_empty() || self.resource == "namespaces"
    }

    pub fn request(&self) -> MetricRequest {
        MetricRequest::new(
            GroupResource::parse(&self.resource),
            self.namespaced(),
            self.metric.clone(),
        )
    }

    pub fn coordinate(&self) -> ObjectCoordinate {
        ObjectCoordinate::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    pub labels: Option<String>,
}

/// Binary and decimal quantity suffixes, two-letter suffixes first
const QUANTITY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1048576.0),
    ("Gi", 1073741824.0),
    ("Ti", 1099511627776.0),
    ("Pi", 1125899906842624.0),
    ("Ei", 1152921504606846976.0),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// A written value: a JSON number or a Kubernetes quantity string such as `"300m"`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WriteBody {
    Number(f64),
    Quantity(String),
}

/// Parse a Kubernetes quantity (`1.5`, `300m`, `2Gi`, `1e3`) into a float
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let is_plain = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
            && s.chars().any(|c| c.is_ascii_digit())
    };

    if is_plain(raw) {
        if let Ok(value) = raw.parse::<f64>() {
            return Some(value).filter(|v| v.is_finite());
        }
    }

    QUANTITY_SUFFIXES.iter().find_map(|(suffix, multiplier)| {
        let number = raw.strip_suffix(suffix)?;
        let digits_only = number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'));
        if !digits_only || !is_plain(number) {
            return None;
        }
        number
            .parse::<f64>()
            .ok()
            .map(|v| v * multiplier)
            .filter(|v| v.is_finite())
    })
}

/// Record a metric value; the body is a JSON number or quantity string
async fn write_metric(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let target = WriteTarget::from_path(&path).ok_or_else(|| ApiError::UnknownRoute(path.clone()))?;

    let value = match serde_json::from_slice::<WriteBody>(&body) {
        Ok(WriteBody::Number(value)) => value,
        Ok(WriteBody::Quantity(raw)) => parse_quantity(&raw)
            .ok_or_else(|| ApiError::BadRequest(format!("{:?} is not a valid quantity", raw)))?,
        Err(e) => {
            return Err(ApiError::BadRequest(format!(
                "body must be a JSON number or quantity string: {}",
                e
            )))
        }
    };

    let labels = match params.labels.as_deref() {
        Some(raw) if !raw.is_empty() => LabelSet::from_selector_str(raw)?,
        _ => LabelSet::new(),
    };

    let record = state
        .provider
        .write_metric(&target.request(), target.coordinate(), value, labels)
        .await?;

    state.logger.log_metric_write(
        &record.identity,
        &record.coordinate,
        record.value,
        &record.labels,
    );

    Ok((StatusCode::OK, Json(record)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics));

    if state.enable_ingestion {
        router = router.route("/write-metrics/*path", post(write_metric));
    }

    router.with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
