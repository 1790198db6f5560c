use serde_json::{Map, Value};

/// Priority list of headline fields, first non-null wins.
const PRIORITY_KEYS: [&str; 7] = [
    "recommendation",
    "intrinsic_value_per_share",
    "median_unlevered_beta",
    "wacc",
    "terminal_growth",
    "firm_value",
    "equity_value",
];

/// Print just the key answer.
///
/// A batch (`results` array without a `result` summary) prints one line per
/// ticker; otherwise the first priority field of the `result` object.
pub fn print_minimal(value: &Value) {
    if let Some(map) = value.as_object() {
        if !map.contains_key("result") {
            if let Some(Value::Array(rows)) = map.get("results") {
                for row in rows {
                    println!("{}", format_row(row));
                }
                return;
            }
        }
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        if let Some(val) = headline(map) {
            println!("{}", format_minimal(val));
            return;
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn headline(map: &Map<String, Value>) -> Option<&Value> {
    PRIORITY_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

/// `TICKER RECOMMENDATION VALUE` or `TICKER failed: reason`.
fn format_row(row: &Value) -> String {
    let Some(map) = row.as_object() else {
        return format_minimal(row);
    };
    let ticker = map.get("ticker").map(format_minimal).unwrap_or_default();
    match map.get("error") {
        Some(Value::String(err)) => format!("{ticker} failed: {err}"),
        _ => {
            let call = map.get("recommendation").map(format_minimal).unwrap_or_default();
            let value = map
                .get("intrinsic_value_per_share")
                .map(format_minimal)
                .unwrap_or_default();
            format!("{ticker} {call} {value}")
        }
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
