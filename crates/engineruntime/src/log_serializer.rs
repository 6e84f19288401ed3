use enginecore::{ExecutionState, StepOutput};
use serde_json::Value;

pub const TRUNCATION_PLACEHOLDER: &str = "(truncated)";

/// Replace every string longer than `max_bytes` with the placeholder.
/// Objects and arrays are walked; only the oversized strings change.
pub fn truncate_value(value: Value, max_bytes: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_text(s, max_bytes)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| truncate_value(item, max_bytes))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, truncate_value(item, max_bytes)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_text(text: String, max_bytes: usize) -> String {
    if text.len() > max_bytes {
        TRUNCATION_PLACEHOLDER.to_string()
    } else {
        text
    }
}

pub fn truncate_step_output(output: StepOutput, max_bytes: usize) -> StepOutput {
    StepOutput {
        input: truncate_value(output.input, max_bytes),
        output: output.output.map(|o| truncate_value(o, max_bytes)),
        error_message: output.error_message.map(|m| truncate_text(m, max_bytes)),
        ..output
    }
}

pub fn truncate_execution_state(state: ExecutionState, max_bytes: usize) -> ExecutionState {
    state.map_outputs(|output| truncate_step_output(output, max_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_VALUE_BYTES;
    use enginecore::{Ancestors, StepOutputStatus, StepType};
    use serde_json::json;

    #[test]
    fn test_oversized_field_is_replaced_alone() {
        let huge = "a".repeat(2_197_100);
        let mut state = ExecutionState::new();
        let root = Ancestors::root();
        state.insert_step(
            "mockStep",
            &root,
            StepOutput::running(StepType::Code, json!({"a": huge, "b": "small"}))
                .with_output(json!({"ok": true}))
                .with_status(StepOutputStatus::Succeeded),
        );
        state.insert_step(
            "otherStep",
            &root,
            StepOutput::running(StepType::Code, json!({"a": "untouched"})),
        );

        let result = truncate_execution_state(state, DEFAULT_MAX_VALUE_BYTES);

        let mock = result.get_step("mockStep", &root).unwrap();
        assert_eq!(mock.input["a"], json!("(truncated)"));
        assert_eq!(mock.input["b"], json!("small"));
        assert_eq!(mock.output, Some(json!({"ok": true})));
        assert_eq!(mock.status, StepOutputStatus::Succeeded);
        assert_eq!(
            result.get_step("otherStep", &root).unwrap().input,
            json!({"a": "untouched"})
        );
    }

    #[test]
    fn test_nested_arrays_are_walked() {
        let value = json!({"rows": [{"blob": "xxxxxxxxxx"}, {"blob": "x"}], "n": 10});
        let truncated = truncate_value(value, 5);
        assert_eq!(
            truncated,
            json!({"rows": [{"blob": "(truncated)"}, {"blob": "x"}], "n": 10})
        );
    }

    #[test]
    fn test_string_at_the_limit_is_kept() {
        let value = json!("12345");
        assert_eq!(truncate_value(value.clone(), 5), value);
    }
}
