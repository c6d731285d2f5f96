use serde_json::Value;

/// Combine the outputs of a node's parents, in parent order.
///
/// No inputs is `null`, one input passes through, several strings are joined
/// with a blank line, and anything else stays a list.
pub fn merge_inputs(inputs: Vec<Value>) -> Value {
    match inputs.len() {
        0 => Value::Null,
        1 => inputs.into_iter().next().unwrap_or(Value::Null),
        _ if inputs.iter().all(Value::is_string) => {
            let texts: Vec<&str> = inputs.iter().filter_map(Value::as_str).collect();
            Value::String(texts.join("\n\n"))
        }
        _ => Value::Array(inputs),
    }
}
