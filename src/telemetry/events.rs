use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const TARGET: &str = "telemetry::conversation";
pub(crate) const EVENT_TURN_COMPLETED: &str = "turn_completed";
pub(crate) const EVENT_TURN_FAILED: &str = "turn_failed";
pub(crate) const EVENT_TURN_DEGRADED: &str = "turn_degraded";

pub(crate) const STAGE_SUBTITLE: &str = "subtitle";
pub(crate) const STAGE_SYNTHESIS: &str = "synthesis";

#[derive(Debug, Serialize)]
pub struct TurnCompletedEvent<'a> {
    pub kind: &'static str,
    pub session_id: &'a str,
    pub latency_ms: u64,
    pub is_last: bool,
    pub audio_bytes: usize,
    pub subtitled: bool,
}

#[derive(Debug, Serialize)]
pub struct TurnFailedEvent<'a> {
    pub kind: &'static str,
    pub session_id: &'a str,
    pub code: &'static str,
    pub status: u16,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct TurnDegradedEvent<'a> {
    pub kind: &'static str,
    pub session_id: &'a str,
    pub stage: &'static str,
    pub provider: &'a str,
    pub reason: &'a str,
}

pub fn record_turn_completed(
    kind: &'static str,
    session_id: &str,
    latency: Duration,
    is_last: bool,
    audio_bytes: usize,
    subtitled: bool,
) {
    let event = TurnCompletedEvent {
        kind,
        session_id,
        latency_ms: duration_to_ms(latency),
        is_last,
        audio_bytes,
        subtitled,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_TURN_COMPLETED,
            kind = event.kind,
            session_id = event.session_id,
            latency_ms = event.latency_ms,
            is_last = event.is_last,
            audio_bytes = event.audio_bytes,
            subtitled = event.subtitled,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_TURN_COMPLETED,
            %err,
            "failed to encode turn completed event"
        ),
    }
}

pub fn record_turn_failed(
    kind: &'static str,
    session_id: &str,
    code: &'static str,
    status: u16,
    latency: Duration,
) {
    let event = TurnFailedEvent {
        kind,
        session_id,
        code,
        status,
        latency_ms: duration_to_ms(latency),
    };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_TURN_FAILED,
            kind = event.kind,
            session_id = event.session_id,
            code = event.code,
            status = event.status,
            latency_ms = event.latency_ms,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_TURN_FAILED,
            %err,
            "failed to encode turn failed event"
        ),
    }
}

/// A soft failure: the turn still succeeds without the named enhancement.
pub fn record_turn_degraded(
    kind: &'static str,
    session_id: &str,
    stage: &'static str,
    provider: &str,
    reason: &str,
) {
    let event = TurnDegradedEvent {
        kind,
        session_id,
        stage,
        provider,
        reason,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_TURN_DEGRADED,
            kind = event.kind,
            session_id = event.session_id,
            stage = event.stage,
            provider = event.provider,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_TURN_DEGRADED,
            %err,
            "failed to encode turn degraded event"
        ),
    }
}

pub(crate) fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
