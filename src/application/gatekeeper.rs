//! Percentage rollout switches persisted in the shared store.
//!
//! Each gate is a hash at `gatekeeper:{name}` with `percent` and
//! `description` fields. State is read on every call so a change takes effect
//! for the next operation everywhere at once.

use std::sync::Arc;

use crate::cache::{CacheError, KeyValueStore, gate_key};

const PERCENT_FIELD: &str = "percent";
const DESCRIPTION_FIELD: &str = "description";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    pub percent: i64,
    pub description: String,
}

#[derive(Clone)]
pub struct GateKeeper {
    store: Arc<dyn KeyValueStore>,
}

impl GateKeeper {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current state of `name`; `{0, ""}` for a gate that was never set.
    pub async fn get(&self, name: &str) -> Result<GateState, CacheError> {
        let key = gate_key(name);
        let mut fields = self.store.hash_get_all(&key).await?;

        let percent = match fields.remove(PERCENT_FIELD) {
            None => 0,
            Some(raw) => raw.trim().parse::<i64>().map_err(|err| {
                CacheError::corrupt(key.as_str(), format!("percent `{raw}`: {err}"))
            })?,
        };
        Ok(GateState {
            percent,
            description: fields.remove(DESCRIPTION_FIELD).unwrap_or_default(),
        })
    }

    /// Write one field of the gate hash. Values are stored as given.
    pub async fn set(&self, name: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.store.hash_set(&gate_key(name), field, value).await
    }

    /// Set the rollout percentage, clamped to 100.
    pub async fn set_percent(&self, name: &str, percent: u8) -> Result<(), CacheError> {
        let percent = percent.min(100);
        self.set(name, PERCENT_FIELD, &percent.to_string()).await
    }

    pub async fn set_description(&self, name: &str, description: &str) -> Result<(), CacheError> {
        self.set(name, DESCRIPTION_FIELD, description).await
    }

    pub async fn is_switch_on(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.get(name).await?.percent == 100)
    }

    /// Whether `operand_id` falls in the rolled-out bucket range of `name`.
    pub async fn is_in_gate(&self, name: &str, operand_id: i64) -> Result<bool, CacheError> {
        let percent = self.get(name).await?.percent;
        Ok(operand_id.rem_euclid(100) < percent)
    }
}
