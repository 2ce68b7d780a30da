use lending_analytics_core::types::NOT_AVAILABLE;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Render the envelope as tables: scalar result fields first, then one
/// sub-table per array of rows, then warnings and methodology.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => {
                print_section(None, result);
                print_footer(map);
            }
            None => print_section(None, value),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_section(title: Option<&str>, value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(t) = title {
                println!("\n{}", t);
            }
            print_fields(map);
            for (key, val) in map {
                match val {
                    Value::Array(arr) if is_row_array(arr) => {
                        println!("\n{}", key);
                        print_rows(arr);
                    }
                    Value::Object(inner) if inner.values().any(is_nested) => {
                        print_section(Some(key), val);
                    }
                    _ => {}
                }
            }
        }
        Value::Array(arr) => {
            if let Some(t) = title {
                println!("\n{}", t);
            }
            print_rows(arr);
        }
        _ => println!("{}", format_value(value)),
    }
}

fn print_fields(map: &Map<String, Value>) {
    let scalars: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(_, v)| !is_nested(v) || matches!(v, Value::Object(o) if !o.values().any(is_nested)))
        .filter(|(_, v)| !matches!(v, Value::Array(a) if is_row_array(a)))
        .collect();
    if scalars.is_empty() {
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in scalars {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn print_footer(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn is_row_array(arr: &[Value]) -> bool {
    arr.first().is_some_and(Value::is_object)
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Array(arr) => is_row_array(arr),
        Value::Object(_) => true,
        _ => false,
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => NOT_AVAILABLE.to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
