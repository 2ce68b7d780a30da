use serde_json::Value;

/// Print just the headline figure of the result.
///
/// Looks for well-known fields in priority order, then falls back to the
/// first field of the result object. Array results print one line per row.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "screen",
        "delta",
        "hhi",
        "p_value",
        "concentration_level",
        "mean",
        "median",
        "mmct_share_pct",
        "q50",
    ];

    match result_obj {
        Value::Object(map) => {
            for key in &priority_keys {
                if let Some(val) = map.get(*key).filter(|v| !v.is_null()) {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
            if let Some(thresholds) = map.get("thresholds").filter(|v| v.is_object()) {
                print_minimal(thresholds);
                return;
            }
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
                return;
            }
        }
        Value::Array(arr) if arr.iter().all(Value::is_object) => {
            for row in arr {
                print_minimal(row);
            }
            return;
        }
        _ => {}
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "N/A".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
