//! Status API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>` and
//! written only by the trading loop.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::storage::{CacheHealth, QuoteStore};
use crate::types::{CycleReport, ExecutionResult, ExecutionStatus, OpportunityRecord};

/// Most recent executions kept for `/api/transactions`.
pub const MAX_TRANSACTIONS: usize = 30;

/// Frames buffered per live subscriber before it starts skipping.
const LIVE_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub cycle_count: u64,
    pub opportunities_seen: u64,
    pub trades_simulated: u64,
    pub trades_confirmed: u64,
    pub trades_failed: u64,
    pub last_cycle: Option<CycleReport>,
}

pub struct DashboardState {
    agent_name: String,
    dry_run: bool,
    started_at: DateTime<Utc>,
    store: Arc<QuoteStore>,
    pub counters: RwLock<Counters>,
    pub opportunities: RwLock<Vec<OpportunityRecord>>,
    pub transactions: RwLock<VecDeque<ExecutionResult>>,
    live: broadcast::Sender<String>,
}

impl DashboardState {
    pub fn new(agent_name: impl Into<String>, dry_run: bool, store: Arc<QuoteStore>) -> Self {
        Self {
            agent_name: agent_name.into(),
            dry_run,
            started_at: Utc::now(),
            store,
            counters: RwLock::new(Counters::default()),
            opportunities: RwLock::new(Vec::new()),
            transactions: RwLock::new(VecDeque::with_capacity(MAX_TRANSACTIONS)),
            live: broadcast::channel(LIVE_CHANNEL_CAPACITY).0,
        }
    }

    pub async fn status(&self) -> StatusResponse {
        let counters = self.counters.read().await.clone();
        StatusResponse {
            agent: self.agent_name.clone(),
            dry_run: self.dry_run,
            cache: self.store.health(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            cycle_count: counters.cycle_count,
            opportunities_seen: counters.opportunities_seen,
            trades_simulated: counters.trades_simulated,
            trades_confirmed: counters.trades_confirmed,
            trades_failed: counters.trades_failed,
            last_cycle: counters.last_cycle,
        }
    }

    /// Executions, newest first.
    pub async fn recent_transactions(&self) -> Vec<ExecutionResult> {
        self.transactions.read().await.iter().rev().cloned().collect()
    }

    /// Full state as one live-feed frame of the given type.
    pub async fn live_frame(&self, kind: LiveFrameKind) -> LiveFrame {
        LiveFrame {
            kind,
            opportunities: self.opportunities.read().await.clone(),
            status: self.status().await,
            transactions: self.recent_transactions().await,
            ts: Utc::now().timestamp_millis(),
        }
    }

    /// Receiver of every tick frame published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.live.subscribe()
    }

    /// Replace the latest opportunity list and fold in a cycle's report.
    pub async fn record_cycle(&self, report: &CycleReport, opportunities: Vec<OpportunityRecord>) {
        {
            let mut counters = self.counters.write().await;
            counters.cycle_count = report.cycle_number;
            counters.opportunities_seen += report.opportunities_found as u64;
            counters.last_cycle = Some(report.clone());
        }
        *self.opportunities.write().await = opportunities;
        self.publish_tick().await;
    }

    async fn publish_tick(&self) {
        if self.live.receiver_count() == 0 {
            return;
        }
        match serde_json::to_string(&self.live_frame(LiveFrameKind::Tick).await) {
            // Fails only when every subscriber has gone away meanwhile.
            Ok(frame) => {
                let _ = self.live.send(frame);
            }
            Err(e) => debug!(error = %e, "Failed to encode live frame"),
        }
    }

    /// Append an execution, evicting the oldest beyond the cap.
    pub async fn record_execution(&self, result: ExecutionResult) {
        {
            let mut counters = self.counters.write().await;
            match result.status {
                ExecutionStatus::Simulated => counters.trades_simulated += 1,
                ExecutionStatus::Confirmed => counters.trades_confirmed += 1,
                ExecutionStatus::Failed => counters.trades_failed += 1,
            }
        }

        let mut transactions = self.transactions.write().await;
        if transactions.len() == MAX_TRANSACTIONS {
            transactions.pop_front();
        }
        transactions.push_back(result);
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub agent: String,
    pub dry_run: bool,
    pub cache: CacheHealth,
    pub uptime_secs: i64,
    pub cycle_count: u64,
    pub opportunities_seen: u64,
    pub trades_simulated: u64,
    pub trades_confirmed: u64,
    pub trades_failed: u64,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveFrameKind {
    /// Sent once when a client connects.
    Snapshot,
    /// Sent after every trading cycle.
    Tick,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveFrame {
    #[serde(rename = "type")]
    pub kind: LiveFrameKind,
    pub opportunities: Vec<OpportunityRecord>,
    pub status: StatusResponse,
    pub transactions: Vec<ExecutionResult>,
    /// Unix epoch milliseconds.
    pub ts: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "predictarb",
        "ts": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.status().await)
}

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<Items<OpportunityRecord>> {
    Json(Items {
        items: state.opportunities.read().await.clone(),
    })
}

/// GET /api/transactions (newest first)
pub async fn get_transactions(State(state): State<AppState>) -> Json<Items<ExecutionResult>> {
    Json(Items {
        items: state.recent_transactions().await,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
