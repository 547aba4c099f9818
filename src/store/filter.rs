//! Evaluation of store filters against documents.
//!
//! Supported: field equality (a scalar also matches inside an array),
//! `$exists`, `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`,
//! `$regex` with `$options`, `$not`, and the `$and` / `$or` / `$nor`
//! combinators. Field names may be dotted paths.

use crate::core::{ConsysError, Document, Result, compare_values, get_path, values_equal};
use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;
use std::mem::discriminant;

pub fn matches(document: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, condition)? {
                    if !matches(document, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, condition)? {
                    if matches(document, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in sub_filters(key, condition)? {
                    if matches(document, sub)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(ConsysError::Store(format!(
                    "Unsupported top-level operator '{}'",
                    op
                )));
            }
            path => field_matches(get_path(document, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn sub_filters<'a>(op: &str, condition: &'a Value) -> Result<Vec<&'a Document>> {
    let Value::Array(items) = condition else {
        return Err(ConsysError::Store(format!("'{}' expects an array", op)));
    };
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| ConsysError::Store(format!("'{}' expects filter documents", op)))
        })
        .collect()
}

fn is_operator_document(map: &Document) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(ops) if is_operator_document(ops) => {
            for (op, argument) in ops {
                if op == "$options" {
                    continue;
                }
                if !apply_operator(value, op, argument, ops.get("$options"))? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(value.is_some_and(|actual| equals_or_contains(actual, expected))),
    }
}

fn equals_or_contains(actual: &Value, expected: &Value) -> bool {
    if values_equal(actual, expected) {
        return true;
    }
    match (actual, expected) {
        (Value::Array(items), expected) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        _ => false,
    }
}

fn apply_operator(
    value: Option<&Value>,
    op: &str,
    argument: &Value,
    options: Option<&Value>,
) -> Result<bool> {
    match op {
        "$exists" => {
            let wanted = match argument {
                Value::Bool(flag) => *flag,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                Value::Null => false,
                _ => true,
            };
            Ok(value.is_some() == wanted)
        }
        "$eq" => Ok(value.is_some_and(|actual| equals_or_contains(actual, argument))),
        "$ne" => Ok(!value.is_some_and(|actual| equals_or_contains(actual, argument))),
        "$in" => in_list(value, argument, op),
        "$nin" => in_list(value, argument, op).map(|found| !found),
        "$gt" => Ok(compare_same_kind(value, argument) == Some(Ordering::Greater)),
        "$gte" => Ok(matches!(
            compare_same_kind(value, argument),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        "$lt" => Ok(compare_same_kind(value, argument) == Some(Ordering::Less)),
        "$lte" => Ok(matches!(
            compare_same_kind(value, argument),
            Some(Ordering::Less | Ordering::Equal)
        )),
        "$regex" => regex_matches(value, argument, options),
        "$not" => field_matches(value, argument).map(|matched| !matched),
        other => Err(ConsysError::Store(format!("Unsupported operator '{}'", other))),
    }
}

fn in_list(value: Option<&Value>, argument: &Value, op: &str) -> Result<bool> {
    let Value::Array(candidates) = argument else {
        return Err(ConsysError::Store(format!("'{}' expects an array", op)));
    };
    Ok(match value {
        Some(actual) => candidates
            .iter()
            .any(|candidate| equals_or_contains(actual, candidate)),
        // a missing field equals null
        None => candidates.iter().any(Value::is_null),
    })
}

fn compare_same_kind(value: Option<&Value>, argument: &Value) -> Option<Ordering> {
    let actual = value?;
    if discriminant(actual) != discriminant(argument) {
        return None;
    }
    Some(compare_values(actual, argument))
}

fn regex_matches(value: Option<&Value>, pattern: &Value, options: Option<&Value>) -> Result<bool> {
    let Some(pattern) = pattern.as_str() else {
        return Err(ConsysError::Store("'$regex' expects a string".to_string()));
    };
    let flags = options.and_then(Value::as_str).unwrap_or_default();
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()?;

    Ok(match value {
        Some(Value::String(text)) => regex.is_match(text),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| regex.is_match(text)),
        Some(Value::Number(number)) => regex.is_match(&number.to_string()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn check(doc: Value, filter: Value) -> bool {
        matches(&document(doc), &document(filter)).unwrap()
    }

    #[test]
    fn equality_and_array_membership() {
        let doc = json!({"id": 3, "meta": "onigiri", "sodzu": {"sake": ["onigiri", "ramen"]}});
        assert!(check(doc.clone(), json!({"meta": "onigiri"})));
        assert!(check(doc.clone(), json!({"id": 3.0})));
        assert!(check(doc.clone(), json!({"sodzu.sake": "ramen"})));
        assert!(!check(doc.clone(), json!({"sodzu.sake": "udon"})));
        assert!(!check(doc, json!({"delta": "ola"})));
    }

    #[test]
    fn exists_checks_presence_not_value() {
        let doc = json!({"id": 1, "multi": []});
        assert!(check(doc.clone(), json!({"delta": {"$exists": false}})));
        assert!(check(doc.clone(), json!({"multi": {"$exists": true}})));
        assert!(!check(doc, json!({"multi": {"$exists": false}})));
    }

    #[test]
    fn in_and_range_operators() {
        let doc = json!({"id": 5, "status": 3});
        assert!(check(doc.clone(), json!({"id": {"$in": [1, 5, 9]}})));
        assert!(!check(doc.clone(), json!({"id": {"$nin": [5]}})));
        assert!(check(doc.clone(), json!({"status": {"$gte": 3, "$lt": 4}})));
        assert!(!check(doc.clone(), json!({"status": {"$gt": "1"}})));
        assert!(check(doc, json!({"title": {"$in": [null]}})));
    }

    #[test]
    fn combinators_and_regex() {
        let doc = json!({"title": "Test Search", "meta": "x"});
        assert!(check(
            doc.clone(),
            json!({"$or": [{"meta": "y"}, {"title": {"$regex": "search", "$options": "i"}}]})
        ));
        assert!(!check(doc.clone(), json!({"title": {"$regex": "search"}})));
        assert!(check(doc.clone(), json!({"$and": [{"meta": "x"}, {"title": {"$ne": "x"}}]})));
        assert!(check(doc, json!({"meta": {"$not": {"$eq": "y"}}})));
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let result = matches(
            &document(json!({"id": 1})),
            &document(json!({"id": {"$near": 1}})),
        );
        assert!(result.is_err());
    }
}
