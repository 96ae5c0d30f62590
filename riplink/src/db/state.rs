//! State store implementations

use super::StateStore;
use crate::models::ReconciliationState;
use async_trait::async_trait;
use riplink_common::Result;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::debug;

/// State kept in the `record_state` and `pending_records` tables
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<ReconciliationState> {
        let mut state = ReconciliationState::default();

        let rows = sqlx::query(
            r#"
            SELECT record_id, last_processed_at, issue_handle, last_rip_at, goal_folder
            FROM record_state
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let id: i32 = row.get("record_id");
            if let Some(ts) = row.get::<Option<i64>, _>("last_processed_at") {
                state.last_processed.insert(id, ts);
            }
            if let Some(handle) = row.get::<Option<i64>, _>("issue_handle") {
                state.issues.insert(id, handle);
            }
            if let Some(ts) = row.get::<Option<i64>, _>("last_rip_at") {
                state.last_rip.insert(id, ts);
            }
            if let Some(goal) = row.get::<Option<i32>, _>("goal_folder") {
                state.goal_folders.insert(id, goal);
            }
        }

        state.pending = sqlx::query_scalar("SELECT record_id FROM pending_records ORDER BY record_id")
            .fetch_all(&self.pool)
            .await?;

        debug!(
            records = state.last_processed.len(),
            pending = state.pending.len(),
            "Loaded reconciliation state"
        );
        Ok(state)
    }

    async fn save(&self, state: &ReconciliationState) -> Result<()> {
        let ids: BTreeSet<i32> = state
            .last_processed
            .keys()
            .chain(state.issues.keys())
            .chain(state.last_rip.keys())
            .chain(state.goal_folders.keys())
            .copied()
            .collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM record_state").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM pending_records").execute(&mut *tx).await?;

        for id in &ids {
            sqlx::query(
                r#"
                INSERT INTO record_state (record_id, last_processed_at, issue_handle, last_rip_at, goal_folder)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(*id)
            .bind(state.last_processed.get(id).copied())
            .bind(state.issues.get(id).copied())
            .bind(state.last_rip.get(id).copied())
            .bind(state.goal_folders.get(id).copied())
            .execute(&mut *tx)
            .await?;
        }

        for id in &state.pending {
            sqlx::query("INSERT OR IGNORE INTO pending_records (record_id) VALUES (?)")
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(records = ids.len(), pending = state.pending.len(), "Saved reconciliation state");
        Ok(())
    }
}

/// In-process store for tests and single-cycle runs
#[derive(Default)]
pub struct MemoryStateStore {
    state: RwLock<ReconciliationState>,
}

impl MemoryStateStore {
    pub fn new(initial: ReconciliationState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ReconciliationState> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &ReconciliationState) -> Result<()> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}
