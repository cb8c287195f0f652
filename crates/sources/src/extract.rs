use serde_json::Value;
use stirling_config::Extract;
use stirling_core::{Measurement, Result, StirlingError};

/// Pull one measurement out of a parsed JSON response.
pub fn extract(rule: &Extract, doc: &Value) -> Result<Measurement> {
    match rule {
        Extract::Field { pointer } => {
            let value = lookup(doc, pointer)?;
            as_number(value)
                .ok_or_else(|| StirlingError::Fetch(format!("'{pointer}' is not a number: {value}")))
        }
        Extract::Count { array, field, equals } => {
            let items = lookup(doc, array)?
                .as_array()
                .ok_or_else(|| StirlingError::Fetch(format!("'{array}' is not an array")))?;
            let count = items
                .iter()
                .filter(|item| match (item.get(field), equals) {
                    (Some(v), Some(expected)) => v.as_str() == Some(expected.as_str()),
                    (Some(v), None) => truthy(v),
                    (None, _) => false,
                })
                .count();
            Ok(count as Measurement)
        }
    }
}

fn lookup<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value> {
    doc.pointer(pointer)
        .ok_or_else(|| StirlingError::Fetch(format!("nothing at '{pointer}'")))
}

/// Finite numbers, and strings holding finite numbers. `"inf"` and `"NaN"` are rejected.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// JavaScript-style truthiness.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_pointer_reads_wind_gust() {
        let doc = json!({ "obs": [{ "wind_gust": 6.3, "wind_avg": 2.1 }] });
        let rule = Extract::Field { pointer: "/obs/0/wind_gust".into() };
        assert_eq!(extract(&rule, &doc).unwrap(), 6.3);
    }

    #[test]
    fn empty_pointer_reads_whole_body() {
        assert_eq!(extract(&Extract::default(), &json!(12)).unwrap(), 12.0);
        assert_eq!(extract(&Extract::default(), &json!("4.5")).unwrap(), 4.5);
    }

    #[test]
    fn field_errors_are_fetch_errors() {
        let doc = json!({ "obs": [] });
        let rule = Extract::Field { pointer: "/obs/0/wind_gust".into() };
        assert!(matches!(extract(&rule, &doc), Err(StirlingError::Fetch(_))));

        let doc = json!({ "obs": [{ "wind_gust": null }] });
        assert!(matches!(extract(&rule, &doc), Err(StirlingError::Fetch(_))));
    }

    #[test]
    fn count_truthy_flights() {
        let doc = json!({ "aircraft": [
            { "hex": "a1", "flight": "UAL123 " },
            { "hex": "a2" },
            { "hex": "a3", "flight": "" },
            { "hex": "a4", "flight": "DAL9" },
        ]});
        let rule = Extract::Count { array: "/aircraft".into(), field: "flight".into(), equals: None };
        assert_eq!(extract(&rule, &doc).unwrap(), 2.0);
    }

    #[test]
    fn count_matching_agents() {
        let doc = json!({ "value": [
            { "provisioningState": "RunningRequest" },
            { "provisioningState": "Idle" },
            { "provisioningState": "RunningRequest" },
            { "status": "online" },
        ]});
        let rule = Extract::Count {
            array:  "/value".into(),
            field:  "provisioningState".into(),
            equals: Some("RunningRequest".into()),
        };
        assert_eq!(extract(&rule, &doc).unwrap(), 2.0);
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        let rule = Extract::Field { pointer: "/v".into() };
        for raw in ["inf", "-inf", "infinity", "NaN"] {
            let doc = json!({ "v": raw });
            assert!(
                matches!(extract(&rule, &doc), Err(StirlingError::Fetch(_))),
                "{raw} should not be a measurement"
            );
        }
        assert_eq!(extract(&rule, &json!({ "v": " 7.5 " })).unwrap(), 7.5);
    }

    #[test]
    fn count_requires_array() {
        let rule = Extract::Count { array: "/value".into(), field: "x".into(), equals: None };
        assert!(extract(&rule, &json!({ "value": 3 })).is_err());
    }
}
