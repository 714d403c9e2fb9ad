use serde_json::Value;
use std::cmp::Ordering;

use crate::db::executor::{ExecutionResult, Record};
use crate::error::VisualizationError;

/// At least one non-null value, and every non-null value is a number.
pub fn is_numeric(rows: &[Record], column: &str) -> bool {
    let mut seen = false;
    for value in rows.iter().filter_map(|row| row.get(column)) {
        match value {
            Value::Null => {}
            Value::Number(_) => seen = true,
            _ => return false,
        }
    }
    seen
}

/// First numeric and first non-numeric column, scanning left to right.
pub fn label_and_value(result: &ExecutionResult) -> Option<(&str, &str)> {
    let label = result
        .columns
        .iter()
        .find(|c| !is_numeric(&result.rows, c))?;
    let value = result
        .columns
        .iter()
        .find(|c| is_numeric(&result.rows, c))?;
    Some((label.as_str(), value.as_str()))
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Total order over cell values: null < bool < number < string < nested.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

pub fn compare_by(column: &str) -> impl Fn(&Record, &Record) -> Ordering + '_ {
    move |a, b| {
        compare_values(
            a.get(column).unwrap_or(&Value::Null),
            b.get(column).unwrap_or(&Value::Null),
        )
    }
}

/// Checks every row has a scalar label in `column` for series grouping.
pub fn group_labels(rows: &[Record], column: &str) -> Result<Vec<String>, VisualizationError> {
    rows.iter()
        .enumerate()
        .map(|(row, record)| match record.get(column) {
            None => Err(VisualizationError::MissingColumn(column.to_string())),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(VisualizationError::UnlabelledGroup {
                column: column.to_string(),
                row,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn numeric_columns_ignore_nulls_but_need_a_value() {
        let rows = rows(vec![
            json!({"a": 1, "b": null, "c": "x"}),
            json!({"a": null, "b": null, "c": 2}),
        ]);
        assert!(is_numeric(&rows, "a"));
        assert!(!is_numeric(&rows, "b"));
        assert!(!is_numeric(&rows, "c"));
    }

    #[test]
    fn values_order_by_kind_then_content() {
        let mut values = vec![json!("b"), json!(2.5), json!(null), json!(true), json!("a"), json!(-1)];
        values.sort_by(compare_values);
        assert_eq!(
            values,
            vec![json!(null), json!(true), json!(-1), json!(2.5), json!("a"), json!("b")]
        );
    }

    #[test]
    fn group_labels_reject_nulls_and_nested_values() {
        let good = rows(vec![json!({"g": "CA"}), json!({"g": 3})]);
        assert_eq!(group_labels(&good, "g").unwrap(), vec!["CA", "3"]);

        let null = rows(vec![json!({"g": "CA"}), json!({"g": null})]);
        assert_eq!(
            group_labels(&null, "g"),
            Err(VisualizationError::UnlabelledGroup { column: "g".to_string(), row: 1 })
        );
        assert!(group_labels(&good, "missing").is_err());
    }
}
