//! Batch normalizer
//!
//! Flattens the nested batch JSON returned by the brewing-log service into
//! [`BatchRecord`] / [`BatchSummary`]. Malformed values never fail the
//! conversion; they come out as `None`.

use brewlabel_common::db::models::{
    BatchRecord, BatchSummary, BottlingEvent, BottlingSource, RecipeRecord, BOTTLING_EVENT_TYPE,
};
use brewlabel_common::time::{format_display_date, format_display_datetime};
use serde_json::Value;

/// Note status marking the start of conditioning (bottling)
const CONDITIONING_STATUS: &str = "Conditioning";

/// Normalize a detailed batch response
pub fn normalize_batch(raw: &Value) -> BatchRecord {
    let recipe = raw.get("recipe").filter(|r| r.is_object());

    let name = string_field(raw, "name").or_else(|| recipe.and_then(|r| string_field(r, "name")));

    BatchRecord {
        id: entity_id(raw),
        batch_no: integer_field(raw, "batchNo"),
        brewer: string_field(raw, "brewer"),
        brew_date: raw.get("brewDate").and_then(epoch_millis).and_then(format_display_date),
        name,
        measured_abv: raw.get("measuredAbv").and_then(Value::as_f64),
        estimated_ibu: raw.get("estimatedIbu").and_then(Value::as_f64),
        estimated_color: raw.get("estimatedColor").and_then(Value::as_f64),
        recipe: recipe.map(normalize_recipe),
        bottling_event: resolve_bottling(raw),
    }
}

/// Normalize one entry of the batch listing
pub fn normalize_summary(raw: &Value) -> BatchSummary {
    BatchSummary {
        id: entity_id(raw),
        brewer: string_field(raw, "brewer"),
        batch_no: integer_field(raw, "batchNo"),
        brew_date: raw.get("brewDate").and_then(epoch_millis).and_then(format_display_date),
        recipe_name: raw
            .get("recipe")
            .filter(|r| r.is_object())
            .and_then(|r| string_field(r, "name")),
    }
}

/// Normalize a listing response; anything but an array yields no entries
pub fn normalize_summaries(raw: &Value) -> Vec<BatchSummary> {
    raw.as_array()
        .map(|items| items.iter().map(normalize_summary).collect())
        .unwrap_or_default()
}

fn normalize_recipe(raw: &Value) -> RecipeRecord {
    let style = match raw.get("style") {
        Some(Value::Object(style)) => style.get("name").and_then(Value::as_str).map(str::to_string),
        Some(Value::String(style)) => Some(style.clone()),
        _ => None,
    };

    RecipeRecord {
        id: entity_id(raw),
        name: string_field(raw, "name"),
        style,
    }
}

/// First conditioning note wins, then the first bottling-day event
fn resolve_bottling(raw: &Value) -> Option<BottlingEvent> {
    let note = array_field(raw, "notes")
        .find(|n| n.get("status").and_then(Value::as_str) == Some(CONDITIONING_STATUS));
    if let Some(note) = note {
        return Some(bottling_event(
            BottlingSource::ConditioningNote,
            note.get("timestamp"),
        ));
    }

    let event = array_field(raw, "events")
        .find(|e| e.get("eventType").and_then(Value::as_str) == Some(BOTTLING_EVENT_TYPE));
    event.map(|e| bottling_event(BottlingSource::BottlingDayEvent, e.get("time")))
}

fn bottling_event(source: BottlingSource, instant: Option<&Value>) -> BottlingEvent {
    // An instant chrono cannot represent is as malformed as a non-numeric one
    let timestamp_ms = instant
        .and_then(epoch_millis)
        .filter(|ms| format_display_datetime(*ms).is_some());

    BottlingEvent {
        event_type: BOTTLING_EVENT_TYPE.to_string(),
        source,
        timestamp_ms,
        time_human: timestamp_ms.and_then(format_display_datetime),
    }
}

fn array_field<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    raw.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn entity_id(raw: &Value) -> Option<String> {
    string_field(raw, "_id").or_else(|| string_field(raw, "id"))
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn integer_field(raw: &Value, key: &str) -> Option<i64> {
    let value = raw.get(key)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Epoch milliseconds from a JSON number; anything else is malformed
fn epoch_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}
