//! Override merge engine
//!
//! Builds the placeholder map substituted into label templates.
//!
//! Precedence, highest first:
//! 1. Override field values (non-blank)
//! 2. Stored or fetched batch values
//! 3. Tags, which only fill placeholders that are missing or empty
//!
//! Stored batches arrive here already merged by
//! [`crate::db::get_effective_batch`]; [`merge_transient`] does the same
//! field-by-field merge for a freshly fetched record that is not stored yet.

use crate::db::models::{BatchOverride, BatchRecord, EffectiveBatch, TagMap};
use crate::time::{format_measurement, PRINT_TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// Placeholder name to substituted text
pub type PlaceholderMap = BTreeMap<String, String>;

pub const BATCH_NO_PLACEHOLDER: &str = "lote";
pub const NAME_PLACEHOLDER: &str = "receita";
pub const ABV_PLACEHOLDER: &str = "abv";
pub const IBU_PLACEHOLDER: &str = "ibu";
pub const COLOR_PLACEHOLDER: &str = "estimatedColor";
pub const BREW_DATE_PLACEHOLDER: &str = "data_brassagem";
pub const BOTTLING_DATE_PLACEHOLDER: &str = "data_engarrafamento";
pub const PRINT_DATE_PLACEHOLDER: &str = "data_impressao";

/// Tag name that carries the override observation onto the label
pub const OBSERVATION_TAG: &str = "observacao";

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Named label fields for a batch
pub fn label_fields(effective: &EffectiveBatch, printed_at: DateTime<Local>) -> PlaceholderMap {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    let abv = match non_blank(effective.measured_abv.as_deref()) {
        Some(abv) => format!("{}%", abv.trim()),
        None => String::new(),
    };

    let mut fields = PlaceholderMap::new();
    fields.insert(
        BATCH_NO_PLACEHOLDER.to_string(),
        effective.batch_no.map(|n| n.to_string()).unwrap_or_default(),
    );
    fields.insert(NAME_PLACEHOLDER.to_string(), text(&effective.name));
    fields.insert(ABV_PLACEHOLDER.to_string(), abv);
    fields.insert(IBU_PLACEHOLDER.to_string(), text(&effective.estimated_ibu));
    fields.insert(COLOR_PLACEHOLDER.to_string(), text(&effective.estimated_color));
    fields.insert(BREW_DATE_PLACEHOLDER.to_string(), text(&effective.brew_date));
    fields.insert(BOTTLING_DATE_PLACEHOLDER.to_string(), text(&effective.bottling_time));
    fields.insert(
        PRINT_DATE_PLACEHOLDER.to_string(),
        printed_at.format(PRINT_TIMESTAMP_FORMAT).to_string(),
    );
    fields
}

/// Full placeholder map for one label
///
/// Tags only add keys the named fields do not define; a named field stays
/// as it is even when empty. The override observation becomes the
/// `observacao` tag unless a tag with that name already exists.
pub fn apply_overrides(
    effective: &EffectiveBatch,
    tags: &TagMap,
    printed_at: DateTime<Local>,
) -> PlaceholderMap {
    let mut placeholders = label_fields(effective, printed_at);

    let mut extra = tags.clone();
    if let Some(observation) = non_blank(effective.observation.as_deref()) {
        extra
            .entry(OBSERVATION_TAG.to_string())
            .or_insert_with(|| observation.to_string());
    }

    for (key, value) in extra {
        placeholders.entry(key).or_insert(value);
    }
    placeholders
}

/// Merge an override onto a fetched record that has not been stored
pub fn merge_transient(record: &BatchRecord, over: Option<&BatchOverride>) -> EffectiveBatch {
    let pick = |override_value: Option<&String>, base: Option<String>| {
        non_blank(override_value.map(String::as_str))
            .map(|v| v.trim().to_string())
            .or(base)
    };

    EffectiveBatch {
        id: record.id.clone().unwrap_or_default(),
        batch_no: record.batch_no,
        brewer: record.brewer.clone(),
        name: pick(over.and_then(|o| o.name.as_ref()), record.name.clone()),
        brew_date: pick(over.and_then(|o| o.brew_date.as_ref()), record.brew_date.clone()),
        measured_abv: pick(
            over.and_then(|o| o.measured_abv.as_ref()),
            record.measured_abv.map(format_measurement),
        ),
        estimated_ibu: pick(
            over.and_then(|o| o.estimated_ibu.as_ref()),
            record.estimated_ibu.map(format_measurement),
        ),
        estimated_color: pick(
            over.and_then(|o| o.estimated_color.as_ref()),
            record.estimated_color.map(format_measurement),
        ),
        bottling_time: record
            .bottling_event
            .as_ref()
            .and_then(|e| e.time_human.clone()),
        observation: over
            .and_then(|o| non_blank(o.observation.as_deref()))
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn printed_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn effective() -> EffectiveBatch {
        EffectiveBatch {
            id: "b1".to_string(),
            batch_no: Some(17),
            brewer: Some("Ana".to_string()),
            name: Some("Saison".to_string()),
            brew_date: Some("05/03/2024".to_string()),
            measured_abv: Some("5.0".to_string()),
            estimated_ibu: Some("28.0".to_string()),
            estimated_color: Some("9.5".to_string()),
            bottling_time: Some("20/03/2024 10:00:00".to_string()),
            observation: None,
        }
    }

    fn override_row(abv: Option<&str>) -> BatchOverride {
        BatchOverride {
            batch_id: "b1".to_string(),
            name: None,
            brew_date: None,
            measured_abv: abv.map(str::to_string),
            estimated_ibu: None,
            estimated_color: None,
            observation: None,
            updated_at: "2024-06-01 09:00:00.000".to_string(),
        }
    }

    #[test]
    fn test_label_fields() {
        let fields = label_fields(&effective(), printed_at());
        assert_eq!(fields["lote"], "17");
        assert_eq!(fields["receita"], "Saison");
        assert_eq!(fields["abv"], "5.0%");
        assert_eq!(fields["ibu"], "28.0");
        assert_eq!(fields["estimatedColor"], "9.5");
        assert_eq!(fields["data_brassagem"], "05/03/2024");
        assert_eq!(fields["data_engarrafamento"], "20/03/2024 10:00:00");
        assert_eq!(fields["data_impressao"], "01/06/2024 09:30");
    }

    #[test]
    fn test_missing_values_render_empty() {
        let mut batch = effective();
        batch.batch_no = None;
        batch.measured_abv = Some("  ".to_string());
        batch.bottling_time = None;

        let fields = label_fields(&batch, printed_at());
        assert_eq!(fields["lote"], "");
        assert_eq!(fields["abv"], "");
        assert_eq!(fields["data_engarrafamento"], "");
    }

    #[test]
    fn test_tag_never_shadows_named_field() {
        let mut tags = TagMap::new();
        tags.insert("abv".to_string(), "9.9".to_string());
        tags.insert("garrafa".to_string(), "600ml".to_string());

        let map = apply_overrides(&effective(), &tags, printed_at());
        assert_eq!(map["abv"], "5.0%");
        assert_eq!(map["garrafa"], "600ml");
    }

    #[test]
    fn test_tag_does_not_fill_empty_named_field() {
        let mut batch = effective();
        batch.batch_no = None;
        batch.bottling_time = None;
        let mut tags = TagMap::new();
        tags.insert("lote".to_string(), "L-99".to_string());
        tags.insert("data_engarrafamento".to_string(), "em breve".to_string());

        let map = apply_overrides(&batch, &tags, printed_at());
        assert_eq!(map["lote"], "");
        assert_eq!(map["data_engarrafamento"], "");
    }

    #[test]
    fn test_observation_becomes_tag_when_absent() {
        let mut batch = effective();
        batch.observation = Some("Dry hopped".to_string());

        let map = apply_overrides(&batch, &TagMap::new(), printed_at());
        assert_eq!(map[OBSERVATION_TAG], "Dry hopped");
    }

    #[test]
    fn test_explicit_observation_tag_wins() {
        let mut batch = effective();
        batch.observation = Some("Dry hopped".to_string());
        let mut tags = TagMap::new();
        tags.insert(OBSERVATION_TAG.to_string(), "Edição limitada".to_string());

        let map = apply_overrides(&batch, &tags, printed_at());
        assert_eq!(map[OBSERVATION_TAG], "Edição limitada");
    }

    #[test]
    fn test_transient_override_precedence() {
        let record = BatchRecord {
            id: Some("b1".to_string()),
            batch_no: Some(17),
            name: Some("Saison".to_string()),
            measured_abv: Some(5.0),
            ..Default::default()
        };

        let merged = merge_transient(&record, Some(&override_row(Some("5.2"))));
        assert_eq!(merged.measured_abv.as_deref(), Some("5.2"));
        assert_eq!(merged.name.as_deref(), Some("Saison"));

        let merged = merge_transient(&record, Some(&override_row(Some(""))));
        assert_eq!(merged.measured_abv.as_deref(), Some("5.0"));

        let merged = merge_transient(&record, None);
        assert_eq!(merged.measured_abv.as_deref(), Some("5.0"));
        assert!(merged.observation.is_none());
    }
}
