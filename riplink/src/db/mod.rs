//! Reconciliation state persistence
//!
//! State is read as a whole at the start of a mutation and written back as
//! a whole at the end; [`StateStore`] hides where it lives.

pub mod state;

pub use state::{MemoryStateStore, SqliteStateStore};

use crate::models::ReconciliationState;
use async_trait::async_trait;
use riplink_common::Result;

/// Load/save of the persisted reconciliation state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<ReconciliationState>;

    /// Replace the stored state; either all of it lands or none
    async fn save(&self, state: &ReconciliationState) -> Result<()>;
}
