//! Tolerant readers for loosely typed backend fields.
//!
//! Cloud functions and stored objects disagree on whether numbers arrive as
//! JSON numbers or strings; both are accepted, everything else reads as absent.

use indexmap::IndexMap;
use serde_json::Value;

use crate::state::PlayerId;

pub(crate) fn int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|float: &f64| float.is_finite())
}

/// Non-negative integer clamped into `u32`.
pub(crate) fn count(value: &Value) -> Option<u32> {
    int(value).map(|raw| raw.clamp(0, i64::from(u32::MAX)) as u32)
}

/// Identifier that may have been serialized as a number.
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Score map with unreadable entries read as zero.
pub(crate) fn scores(raw: &IndexMap<String, Value>) -> IndexMap<PlayerId, u32> {
    raw.iter()
        .filter(|(player, _)| !player.is_empty())
        .map(|(player, score)| (player.clone(), count(score).unwrap_or(0)))
        .collect()
}

/// Player ids from a list, skipping entries that are not ids.
pub(crate) fn ids(raw: &[Value]) -> Vec<PlayerId> {
    raw.iter().filter_map(text).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_accept_numbers_and_numeric_strings() {
        assert_eq!(int(&json!(4)), Some(4));
        assert_eq!(int(&json!("12")), Some(12));
        assert_eq!(int(&json!(2.9)), Some(2));
        assert_eq!(int(&json!("two")), None);
        assert_eq!(int(&json!(null)), None);
    }

    #[test]
    fn counts_clamp_negative_values() {
        assert_eq!(count(&json!(-3)), Some(0));
        assert_eq!(count(&json!(7)), Some(7));
    }

    #[test]
    fn scores_default_unreadable_entries_to_zero() {
        let raw: IndexMap<String, Value> =
            serde_json::from_value(json!({"A": 3, "B": "x", "": 9, "C": "2"})).unwrap();
        let scores = scores(&raw);
        assert_eq!(
            scores.into_iter().collect::<Vec<_>>(),
            vec![("A".into(), 3), ("B".into(), 0), ("C".into(), 2)]
        );
    }

    #[test]
    fn ids_skip_non_identifiers() {
        assert_eq!(
            ids(&[json!("A"), json!(""), json!(null), json!(42)]),
            vec!["A".to_string(), "42".to_string()]
        );
    }
}
