//! 可观测性模块
//!
//! 提供智能体指标、结构化日志和健康检查。

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};

// ===== Agent Metrics =====

/// 智能体运行指标
#[derive(Debug, Default)]
pub struct AgentMetrics {
    pub turns_total: AtomicU64,
    pub turn_failures_total: AtomicU64,
    pub tool_cycles_total: AtomicU64,
    pub tool_calls_total: AtomicU64,
    pub tool_errors_total: AtomicU64,
    pub model_calls_total: AtomicU64,
    pub http_requests_total: AtomicU64,
    pub http_request_duration_ms_sum: AtomicU64,
}

impl AgentMetrics {
    pub fn record_turn(&self, succeeded: bool) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.turn_failures_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 记录一次工具分发循环
    pub fn record_tool_cycle(&self, calls: usize, errors: usize) {
        self.tool_cycles_total.fetch_add(1, Ordering::Relaxed);
        self.tool_calls_total
            .fetch_add(calls as u64, Ordering::Relaxed);
        self.tool_errors_total
            .fetch_add(errors as u64, Ordering::Relaxed);
    }

    pub fn record_model_call(&self) {
        self.model_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
        self.http_request_duration_ms_sum
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// 生成 Prometheus 文本格式
    pub fn gather(&self) -> String {
        let counters = [
            ("memagent_turns_total", "Total turns", &self.turns_total),
            (
                "memagent_turn_failures_total",
                "Turns that ended in an error",
                &self.turn_failures_total,
            ),
            (
                "memagent_tool_cycles_total",
                "Tool dispatch cycles",
                &self.tool_cycles_total,
            ),
            (
                "memagent_tool_calls_total",
                "Tool calls executed",
                &self.tool_calls_total,
            ),
            (
                "memagent_tool_errors_total",
                "Tool calls that returned an error result",
                &self.tool_errors_total,
            ),
            (
                "memagent_model_calls_total",
                "Language model invocations",
                &self.model_calls_total,
            ),
            (
                "http_requests_total",
                "Total HTTP requests",
                &self.http_requests_total,
            ),
        ];

        let mut output = String::new();
        for (name, help, counter) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                counter.load(Ordering::Relaxed)
            ));
        }
        output.push_str(&format!(
            "# HELP http_request_duration_seconds_sum Total HTTP request time\n\
             # TYPE http_request_duration_seconds_sum counter\n\
             http_request_duration_seconds_sum {}\n",
            self.http_request_duration_ms_sum.load(Ordering::Relaxed) as f64 / 1000.0
        ));
        output
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
}

#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<AgentMetrics>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(metrics: Arc<AgentMetrics>, version: &str) -> Self {
        Self {
            metrics,
            start_time: Utc::now(),
            version: version.to_string(),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

pub async fn health_check(State(state): State<ObservabilityState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<ObservabilityState>) -> impl IntoResponse {
    (axum::http::StatusCode::OK, state.metrics.gather())
}

/// 创建可观测性路由
pub fn create_observability_router(state: ObservabilityState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// 记录请求指标的中间件
pub async fn metrics_middleware(
    State(metrics): State<Arc<AgentMetrics>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    metrics.record_http_request(start.elapsed().as_millis() as u64);
    response
}

// ===== Structured Logging =====

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了 `log_dir` 时额外按天滚动写入
/// JSON 日志文件，返回的 guard 需要保持到进程退出。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let (json_layer, text_layer) = if config.structured {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (
            None,
            Some(fmt::layer().with_target(true).with_line_number(true)),
        )
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "memagent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to set tracing subscriber: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_gather() {
        let metrics = AgentMetrics::default();
        metrics.record_turn(true);
        metrics.record_turn(false);
        metrics.record_tool_cycle(3, 1);
        metrics.record_model_call();
        metrics.record_http_request(250);

        let output = metrics.gather();
        assert!(output.contains("memagent_turns_total 2"));
        assert!(output.contains("memagent_turn_failures_total 1"));
        assert!(output.contains("memagent_tool_calls_total 3"));
        assert!(output.contains("memagent_tool_errors_total 1"));
        assert!(output.contains("memagent_model_calls_total 1"));
        assert!(output.contains("http_request_duration_seconds_sum 0.25"));
    }

    #[test]
    fn test_uptime_is_non_negative() {
        let state = ObservabilityState::new(Arc::new(AgentMetrics::default()), "0.1.0");
        assert!(state.uptime_seconds() >= 0.0);
    }
}
