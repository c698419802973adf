//! Worker registry types
//!
//! A worker is any entity that performs sessions: a human employee
//! clocking shifts, or an AI agent running tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Human employee
    Human,
    /// AI agent
    Agent,
}

/// Availability status of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Currently in a session
    Active,
    /// Registered and available, no session running
    Idle,
    /// Temporarily unreachable
    Offline,
    /// Deactivated; excluded from workforce counts
    Inactive,
}

/// A registered worker (human or agent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker ID
    pub id: Uuid,
    /// Owning company
    pub company_id: Uuid,
    /// Human or agent
    pub kind: WorkerKind,
    /// Display name
    pub name: String,
    /// Job role or agent purpose
    pub role: String,
    /// Model powering an agent worker (agents only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Current availability
    pub status: WorkerStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Last time a session touched this worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    /// Free-form metadata, opaque to the ledger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Fields accepted when registering a worker.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorker {
    /// Owning company
    pub company_id: Uuid,
    /// Human or agent
    pub kind: WorkerKind,
    /// Display name
    pub name: String,
    /// Job role or agent purpose
    pub role: String,
    /// Model powering an agent worker
    #[serde(default)]
    pub model_name: Option<String>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
