//! Database models
//!
//! `*Record` / `BatchSummary` are normalizer output (not yet persisted).
//! The remaining structs are rows read back from the store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Event type stored for a resolved bottling instant
pub const BOTTLING_EVENT_TYPE: &str = "event-batch-bottling-day";

/// Free-form placeholder tags keyed by tag name
pub type TagMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub style: Option<String>,
}

/// Where a bottling instant was found in the remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BottlingSource {
    /// First note with status "Conditioning"
    ConditioningNote,
    /// First event of type `event-batch-bottling-day`
    BottlingDayEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottlingEvent {
    pub event_type: String,
    pub source: BottlingSource,
    /// Epoch milliseconds; `None` when the remote value was malformed
    pub timestamp_ms: Option<i64>,
    /// `dd/mm/YYYY HH:MM:SS` local time
    pub time_human: Option<String>,
}

/// Canonical batch as produced by the normalizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: Option<String>,
    pub batch_no: Option<i64>,
    pub brewer: Option<String>,
    /// `dd/mm/YYYY` local date
    pub brew_date: Option<String>,
    pub name: Option<String>,
    pub measured_abv: Option<f64>,
    pub estimated_ibu: Option<f64>,
    pub estimated_color: Option<f64>,
    pub recipe: Option<RecipeRecord>,
    pub bottling_event: Option<BottlingEvent>,
}

impl BatchRecord {
    /// Promote a listing-mode summary; measurements and bottling stay empty
    pub fn from_summary(summary: &BatchSummary) -> Self {
        Self {
            id: summary.id.clone(),
            batch_no: summary.batch_no,
            brewer: summary.brewer.clone(),
            brew_date: summary.brew_date.clone(),
            name: summary.recipe_name.clone(),
            ..Default::default()
        }
    }
}

/// Reduced field set returned by the remote listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub id: Option<String>,
    pub brewer: Option<String>,
    pub batch_no: Option<i64>,
    pub brew_date: Option<String>,
    pub recipe_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: String,
    pub batch_no: Option<i64>,
    pub brewer: Option<String>,
    pub brew_date: Option<String>,
    pub name: Option<String>,
    pub measured_abv: Option<f64>,
    pub estimated_ibu: Option<f64>,
    pub estimated_color: Option<f64>,
    pub recipe_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BatchEventRow {
    pub event_type: String,
    pub time_ts: Option<i64>,
    pub time_human: Option<String>,
    pub created_at: String,
}

/// Overridable label fields; values are kept as entered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideFields {
    pub name: Option<String>,
    pub brew_date: Option<String>,
    pub measured_abv: Option<String>,
    pub estimated_ibu: Option<String>,
    pub estimated_color: Option<String>,
}

/// Current override for a batch (latest write wins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BatchOverride {
    pub batch_id: String,
    pub name: Option<String>,
    pub brew_date: Option<String>,
    pub measured_abv: Option<String>,
    pub estimated_ibu: Option<String>,
    pub estimated_color: Option<String>,
    pub observation: Option<String>,
    pub updated_at: String,
}

impl BatchOverride {
    pub fn fields(&self) -> OverrideFields {
        OverrideFields {
            name: self.name.clone(),
            brew_date: self.brew_date.clone(),
            measured_abv: self.measured_abv.clone(),
            estimated_ibu: self.estimated_ibu.clone(),
            estimated_color: self.estimated_color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OverrideHistoryEntry {
    pub id: i64,
    pub batch_id: String,
    pub name: Option<String>,
    pub brew_date: Option<String>,
    pub measured_abv: Option<String>,
    pub estimated_ibu: Option<String>,
    pub estimated_color: Option<String>,
    pub observation: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub key: String,
    pub value: String,
    pub created_at: String,
}

/// Batch with the current override applied field by field
///
/// Measurements are display strings (`5.0`, `5.2`) because override values
/// are free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EffectiveBatch {
    pub id: String,
    pub batch_no: Option<i64>,
    pub brewer: Option<String>,
    pub name: Option<String>,
    pub brew_date: Option<String>,
    pub measured_abv: Option<String>,
    pub estimated_ibu: Option<String>,
    pub estimated_color: Option<String>,
    pub bottling_time: Option<String>,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OverriddenBatch {
    pub id: String,
    pub batch_no: Option<i64>,
    pub name: Option<String>,
    pub last_touched: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_summary_leaves_measurements_empty() {
        let summary = BatchSummary {
            id: Some("b1".to_string()),
            brewer: Some("Ana".to_string()),
            batch_no: Some(42),
            brew_date: Some("05/03/2024".to_string()),
            recipe_name: Some("Witbier".to_string()),
        };

        let record = BatchRecord::from_summary(&summary);
        assert_eq!(record.id.as_deref(), Some("b1"));
        assert_eq!(record.name.as_deref(), Some("Witbier"));
        assert_eq!(record.batch_no, Some(42));
        assert!(record.measured_abv.is_none());
        assert!(record.estimated_ibu.is_none());
        assert!(record.bottling_event.is_none());
        assert!(record.recipe.is_none());
    }
}
