//! Draft persistence for in-progress loan applications.
//!
//! Snapshots live in the injected [`KeyValueStore`] under two keys: a single
//! quick-resume slot holding the latest draft, and a JSON list of named
//! drafts ordered most-recent-first and capped at a configured maximum
//! (oldest evicted on overflow).

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{LoanError, Result};
use crate::form::LoanFormData;
use crate::services::KeyValueStore;
use crate::types::LoanStatus;

/// storage key for the quick-resume slot
pub const LAST_DRAFT_KEY: &str = "bms_loan_form_last_draft";
/// storage key for the ordered draft list
pub const DRAFT_LIST_KEY: &str = "bms_loan_form_drafts";
/// default cap on the draft list
pub const DEFAULT_MAX_DRAFTS: usize = 10;

/// a named, timestamped snapshot of the form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    /// creation time in epoch milliseconds; unique within one store
    pub id: i64,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub form_data: LoanFormData,
    pub current_step: u32,
}

pub struct DraftManager<S: KeyValueStore> {
    store: S,
    drafts: Vec<DraftItem>,
    last_draft: Option<DraftItem>,
    active_draft: Option<i64>,
    max_drafts: usize,
}

impl<S: KeyValueStore> DraftManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_capacity(store, DEFAULT_MAX_DRAFTS)
    }

    /// mount-time load: both keys are read once; unreadable payloads degrade
    /// to an empty state
    pub fn with_capacity(store: S, max_drafts: usize) -> Self {
        let drafts = store
            .get(DRAFT_LIST_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    warn!(error = %e, "stored draft list unreadable, starting empty");
                    None
                }
            })
            .unwrap_or_default();
        let last_draft = store
            .get(LAST_DRAFT_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok());

        Self {
            store,
            drafts,
            last_draft,
            active_draft: None,
            max_drafts,
        }
    }

    /// snapshot the form under a derived display name. Writes the
    /// quick-resume slot and prepends to the capped list; a storage failure
    /// surfaces as an error and leaves the in-memory list unchanged.
    pub fn save_draft(
        &mut self,
        form: &LoanFormData,
        current_step: u32,
        customer_name: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<DraftItem> {
        let now = time.now();
        let mut form_data = form.clone();
        form_data.status = LoanStatus::Draft;

        let item = DraftItem {
            id: self.next_id(now),
            name: derive_draft_name(customer_name, &form_data.nic),
            saved_at: now,
            form_data,
            current_step,
        };

        let mut updated = self.drafts.clone();
        updated.insert(0, item.clone());
        updated.truncate(self.max_drafts);

        let list_payload = serde_json::to_string(&updated).map_err(|e| LoanError::Storage {
            message: e.to_string(),
        })?;
        let last_payload = serde_json::to_string(&item).map_err(|e| LoanError::Storage {
            message: e.to_string(),
        })?;

        self.store.set(LAST_DRAFT_KEY, &last_payload)?;
        self.store.set(DRAFT_LIST_KEY, &list_payload)?;

        self.drafts = updated;
        self.last_draft = Some(item.clone());
        Ok(item)
    }

    /// hand a stored draft to the caller's loader and mark it active; the
    /// stored list is never mutated by a load
    pub fn load_draft<F>(&mut self, id: i64, apply: F) -> Result<()>
    where
        F: FnOnce(&LoanFormData, u32),
    {
        let Some(item) = self.drafts.iter().find(|d| d.id == id) else {
            return Err(LoanError::DraftNotFound { id });
        };
        apply(&item.form_data, item.current_step);
        self.active_draft = Some(id);
        Ok(())
    }

    /// remove a draft and persist the shortened list; a missing id is a
    /// no-op success
    pub fn delete_draft(&mut self, id: i64) -> Result<()> {
        let before = self.drafts.len();
        let updated: Vec<DraftItem> =
            self.drafts.iter().filter(|d| d.id != id).cloned().collect();
        if updated.len() == before {
            return Ok(());
        }

        let payload = serde_json::to_string(&updated).map_err(|e| LoanError::Storage {
            message: e.to_string(),
        })?;
        self.store.set(DRAFT_LIST_KEY, &payload)?;

        self.drafts = updated;
        if self.active_draft == Some(id) {
            self.active_draft = None;
        }
        Ok(())
    }

    pub fn drafts(&self) -> &[DraftItem] {
        &self.drafts
    }

    /// latest snapshot for quick resume
    pub fn last_draft(&self) -> Option<&DraftItem> {
        self.last_draft.as_ref()
    }

    pub fn active_draft(&self) -> Option<i64> {
        self.active_draft
    }

    /// epoch-millisecond id, bumped past the newest existing id when two
    /// saves land in the same millisecond
    fn next_id(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        match self.drafts.first() {
            Some(newest) if candidate <= newest.id => newest.id + 1,
            _ => candidate,
        }
    }
}

/// prefer the customer's display name, fall back to an NIC label, then a
/// generic placeholder
fn derive_draft_name(customer_name: Option<&str>, nic: &str) -> String {
    if let Some(name) = customer_name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    if !nic.trim().is_empty() {
        return format!("NIC {}", nic.trim());
    }
    "Untitled application".to_string()
}
