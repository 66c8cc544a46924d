//! 服务健康状态汇总：持久化、密钥有效性与上游供应商状态。

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::orchestrator::ProviderError;
use crate::persistence::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Green,
    Degraded,
    Down,
}

/// Component status as published by a provider's status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamStatus {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    Unknown,
}

impl UpstreamStatus {
    pub fn from_component(status: &str) -> Self {
        match status {
            "operational" => UpstreamStatus::Operational,
            "degraded_performance" => UpstreamStatus::DegradedPerformance,
            "partial_outage" => UpstreamStatus::PartialOutage,
            "major_outage" => UpstreamStatus::MajorOutage,
            _ => UpstreamStatus::Unknown,
        }
    }

    pub fn level(&self) -> HealthLevel {
        match self {
            UpstreamStatus::Operational => HealthLevel::Green,
            UpstreamStatus::DegradedPerformance
            | UpstreamStatus::PartialOutage
            | UpstreamStatus::Unknown => HealthLevel::Degraded,
            UpstreamStatus::MajorOutage => HealthLevel::Down,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            UpstreamStatus::Operational => 0,
            UpstreamStatus::DegradedPerformance => 1,
            UpstreamStatus::PartialOutage => 2,
            UpstreamStatus::MajorOutage => 3,
            UpstreamStatus::Unknown => 0,
        }
    }

    /// Worst known status of the given components; `Unknown` when none is known.
    pub fn worst<I: IntoIterator<Item = UpstreamStatus>>(statuses: I) -> Self {
        statuses
            .into_iter()
            .filter(|status| *status != UpstreamStatus::Unknown)
            .max_by_key(UpstreamStatus::severity)
            .unwrap_or(UpstreamStatus::Unknown)
    }
}

/// Health probes of an upstream capability provider.
#[async_trait]
pub trait ProviderHealth: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(false)` means the provider answered and refused the key.
    async fn key_valid(&self) -> Result<bool, ProviderError>;

    async fn upstream_status(&self) -> Result<UpstreamStatus, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub persistence: HealthLevel,
    pub key: HealthLevel,
    pub upstream: HealthLevel,
    pub upstream_status: UpstreamStatus,
    pub overall: HealthLevel,
}

pub async fn collect(
    store: &dyn ConversationStore,
    provider: Option<&dyn ProviderHealth>,
) -> StatusReport {
    let persistence = match store.ping().await {
        Ok(()) => HealthLevel::Green,
        Err(err) => {
            warn!(target: "status", %err, "persistence ping failed");
            HealthLevel::Down
        }
    };

    let (key, upstream_status) = match provider {
        Some(provider) => {
            let key = match provider.key_valid().await {
                Ok(true) => HealthLevel::Green,
                Ok(false) => {
                    warn!(target: "status", provider = provider.name(), "api key rejected");
                    HealthLevel::Down
                }
                Err(err) => {
                    warn!(target: "status", provider = provider.name(), %err, "api key check failed");
                    HealthLevel::Degraded
                }
            };
            let upstream_status = provider.upstream_status().await.unwrap_or_else(|err| {
                warn!(target: "status", provider = provider.name(), %err, "status page unreachable");
                UpstreamStatus::Unknown
            });
            (key, upstream_status)
        }
        None => (HealthLevel::Down, UpstreamStatus::Unknown),
    };

    let upstream = upstream_status.level();
    let overall = persistence.max(key).max(upstream);
    let report = StatusReport {
        persistence,
        key,
        upstream,
        upstream_status,
        overall,
    };
    info!(
        target: "status",
        persistence = ?report.persistence,
        key = ?report.key,
        upstream = ?report.upstream,
        overall = ?report.overall,
        "status collected"
    );
    report
}
