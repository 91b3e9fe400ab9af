//! Shared domain types for vibeforge.
//!
//! Everything here is plain data: the build `Phase` enumeration and the
//! `Project` aggregate with its artifacts, findings and log entries. The
//! orchestrator crate owns all behaviour that mutates these types.

pub mod model;
pub mod phase;

pub use model::{
    Artifact, ArtifactStatus, Finding, LogEntry, Message, MetricPoint, Project, Role, Severity,
    UpsertOutcome,
};
pub use phase::Phase;
