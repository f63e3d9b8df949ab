//! HTTP surface of the exporter.
//!
//! | Path             | Response                                              |
//! |------------------|-------------------------------------------------------|
//! | `<metrics_path>` | Text exposition, resolved fresh on every scrape       |
//! | `/health`        | `200 ok`                                              |
//! | `/ready`         | `200 ready` once a config is loaded, `503` before     |
//! | `/api/v1/config` | Plain-text view of the config and its resolution;     |
//! |                  | `?at=<RFC3339>` resolves at another instant           |
//!
//! Nothing is cached between requests: scheduled overrides make the
//! resolved set depend on the time of the scrape.

use std::convert::Infallible;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::config::{ResolvedThreshold, ThresholdConfig};
use crate::exposition;
use crate::manager::ConfigManager;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Serves metrics and diagnostics for one [`ConfigManager`].
#[derive(Debug)]
pub struct Server {
    manager: Arc<ConfigManager>,
    metrics_path: String,
}

impl Server {
    pub fn new(manager: Arc<ConfigManager>, metrics_path: impl Into<String>) -> Self {
        Self {
            manager,
            metrics_path: metrics_path.into(),
        }
    }

    /// Accept connections on `listener` until the task is dropped.
    ///
    /// Accept failures are logged and the loop keeps going.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(&req)) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %e, "connection error");
                }
            });
        }
    }

    /// Route one request.
    pub fn handle<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        let path = req.uri().path();

        if path == self.metrics_path {
            self.metrics()
        } else if path == "/health" {
            text(StatusCode::OK, "ok")
        } else if path == "/ready" {
            if self.manager.is_loaded() {
                text(StatusCode::OK, "ready")
            } else {
                text(StatusCode::SERVICE_UNAVAILABLE, "not ready")
            }
        } else if path == "/api/v1/config" {
            self.config_view(req.uri().query())
        } else {
            text(StatusCode::NOT_FOUND, "Not Found")
        }
    }

    fn metrics(&self) -> Response<Full<Bytes>> {
        let body = match self.manager.config() {
            Some(config) => {
                let now = Utc::now();
                exposition::render(
                    &config.resolve_at(now),
                    &config.resolve_state_filters_at(now),
                )
            }
            None => String::new(),
        };
        response(StatusCode::OK, exposition::CONTENT_TYPE, body)
    }

    fn config_view(&self, query: Option<&str>) -> Response<Full<Bytes>> {
        let at = match query.and_then(|q| query_param(q, "at")) {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    return text(
                        StatusCode::BAD_REQUEST,
                        format!("invalid 'at' parameter {raw:?}: {e} (expected RFC3339)"),
                    )
                }
            },
            None => None,
        };

        let Some(config) = self.manager.config() else {
            return text(StatusCode::SERVICE_UNAVAILABLE, "config not loaded");
        };

        let body = render_config_view(&self.manager, &config, at);
        text(StatusCode::OK, body)
    }
}

/// Plain-text dump of the snapshot followed by its resolution at `at`
/// (or now).
fn render_config_view(
    manager: &ConfigManager,
    config: &ThresholdConfig,
    at: Option<DateTime<Utc>>,
) -> String {
    let now = at.unwrap_or_else(Utc::now);
    let mut out = String::new();

    let _ = writeln!(out, "Config mode: {}", manager.mode());
    let _ = writeln!(out, "Source: {}", manager.description());
    match manager.last_reload() {
        Some(ts) => {
            let _ = writeln!(out, "Last reload: {}", ts.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        None => {
            let _ = writeln!(out, "Last reload: never");
        }
    }
    let _ = writeln!(
        out,
        "Resolve time: {}{}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        if at.is_some() { " (overridden)" } else { "" }
    );

    let _ = writeln!(out, "\nDefaults:");
    for (key, value) in &config.defaults {
        let _ = writeln!(out, "  {key}: {value}");
    }

    let _ = writeln!(out, "\nState filters:");
    for (name, filter) in &config.state_filters {
        let _ = writeln!(
            out,
            "  {name}: reasons=[{}] severity={} default={}",
            filter.reasons.join(", "),
            filter.effective_severity(),
            if filter.enabled_by_default() { "enable" } else { "disable" }
        );
    }

    let _ = writeln!(out, "\nTenant overrides:");
    for (tenant, overrides) in &config.tenants {
        let _ = writeln!(out, "  {tenant}:");
        for (key, value) in overrides {
            if value.is_scheduled() {
                let _ = writeln!(
                    out,
                    "    {key}: {} (+ {} time overrides)",
                    value.default,
                    value.overrides.len()
                );
            } else {
                let _ = writeln!(out, "    {key}: {}", value.default);
            }
        }
    }

    let _ = writeln!(out, "\nResolved thresholds:");
    let mut lines: Vec<String> = config.resolve_at(now).iter().map(threshold_summary).collect();
    lines.sort();
    for line in lines {
        let _ = writeln!(out, "  {line}");
    }

    let _ = writeln!(out, "\nResolved state filters:");
    for filter in config.resolve_state_filters_at(now) {
        let _ = writeln!(
            out,
            "  {}/{} severity={}",
            filter.tenant, filter.filter, filter.severity
        );
    }

    out
}

fn threshold_summary(t: &ResolvedThreshold) -> String {
    let mut line = format!(
        "{}/{}/{} value={} severity={}",
        t.tenant, t.component, t.metric, t.value, t.severity
    );
    for (name, value) in &t.exact_labels {
        let _ = write!(line, " {name}=\"{value}\"");
    }
    for (name, value) in &t.regex_labels {
        let _ = write!(line, " {name}=~\"{value}\"");
    }
    line
}

/// First value of `name` in a form-encoded query string.
fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn text(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    response(status, TEXT_PLAIN, body.into())
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
