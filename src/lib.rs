//! Mockchat Core Library
//!
//! This crate provides the conversation orchestration engine behind spoken mock
//! conversations: the Start/Answer/End turn protocol, session credentials,
//! transactional turn history, provider adapters, and telemetry.

pub mod config;
pub mod language;
pub mod orchestrator;
pub mod persistence;
pub mod providers;
pub mod session;
pub mod status;
pub mod telemetry;
