use enginecore::{BranchCondition, BranchOperator, StepError};
use serde_json::Value;

/// Operand of a numeric comparison after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericOperand {
    Number(f64),
    /// Not parseable as a number; kept as the original text.
    Text(String),
    /// `null`, arrays and objects never compare.
    Incomparable,
}

/// Coerce a value for the numeric operators.
///
/// Numeric strings become numbers; any other string is returned unchanged,
/// so two non-numeric strings compare lexicographically and a string
/// against a number compares as `false`.
pub fn parse_string_to_number(value: &Value) -> NumericOperand {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(NumericOperand::Number)
            .unwrap_or(NumericOperand::Incomparable),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return NumericOperand::Number(0.0);
            }
            match trimmed.parse::<f64>() {
                Ok(n) if !n.is_nan() => NumericOperand::Number(n),
                _ => NumericOperand::Text(s.clone()),
            }
        }
        Value::Bool(b) => NumericOperand::Number(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => NumericOperand::Incomparable,
    }
}

fn greater_than(a: &NumericOperand, b: &NumericOperand) -> bool {
    match (a, b) {
        (NumericOperand::Number(a), NumericOperand::Number(b)) => a > b,
        (NumericOperand::Text(a), NumericOperand::Text(b)) => a > b,
        _ => false,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalize(value: &Value, case_sensitive: bool) -> String {
    let text = value_to_text(value);
    if case_sensitive {
        text
    } else {
        text.to_lowercase()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn exists(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Evaluate one condition. Only an unknown operator is an error.
pub fn evaluate_condition(condition: &BranchCondition) -> Result<bool, StepError> {
    let first = &condition.first_value;
    let second = condition.second_value.as_ref().unwrap_or(&Value::Null);
    let case_sensitive = condition.case_sensitive.unwrap_or(false);
    let text = || (normalize(first, case_sensitive), normalize(second, case_sensitive));

    let result = match &condition.operator {
        BranchOperator::TextContains => {
            let (a, b) = text();
            a.contains(&b)
        }
        BranchOperator::TextDoesNotContain => {
            let (a, b) = text();
            !a.contains(&b)
        }
        BranchOperator::TextExactlyMatches => {
            let (a, b) = text();
            a == b
        }
        BranchOperator::TextDoesNotExactlyMatch => {
            let (a, b) = text();
            a != b
        }
        BranchOperator::TextStartWith => {
            let (a, b) = text();
            a.starts_with(&b)
        }
        BranchOperator::TextDoesNotStartWith => {
            let (a, b) = text();
            !a.starts_with(&b)
        }
        BranchOperator::TextEndsWith => {
            let (a, b) = text();
            a.ends_with(&b)
        }
        BranchOperator::TextDoesNotEndWith => {
            let (a, b) = text();
            !a.ends_with(&b)
        }
        BranchOperator::NumberIsGreaterThan => {
            greater_than(&parse_string_to_number(first), &parse_string_to_number(second))
        }
        BranchOperator::NumberIsLessThan => {
            greater_than(&parse_string_to_number(second), &parse_string_to_number(first))
        }
        BranchOperator::BooleanIsTrue => is_truthy(first),
        BranchOperator::BooleanIsFalse => !is_truthy(first),
        BranchOperator::Exists => exists(first),
        BranchOperator::DoesNotExist => !exists(first),
        BranchOperator::Unknown(name) => return Err(StepError::UnknownOperator(name.clone())),
    };
    Ok(result)
}

/// Evaluate condition groups: AND inside a group, OR across groups.
/// No groups at all evaluates to `false`.
pub fn evaluate_conditions(groups: &[Vec<BranchCondition>]) -> Result<bool, StepError> {
    let mut any = false;
    for group in groups {
        let mut all = true;
        for condition in group {
            all = evaluate_condition(condition)? && all;
        }
        any = any || all;
    }
    Ok(any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use BranchOperator::*;

    fn check(op: BranchOperator, first: Value, second: Value) -> bool {
        evaluate_condition(&BranchCondition::new(op, first, second)).unwrap()
    }

    fn check_single(op: BranchOperator, first: Value) -> bool {
        evaluate_condition(&BranchCondition::single(op, first)).unwrap()
    }

    #[test]
    fn test_dnf_or_of_and_groups() {
        let groups = vec![
            vec![BranchCondition::new(TextContains, "foo", "oo")],
            vec![BranchCondition::single(BooleanIsFalse, false)],
        ];
        assert!(evaluate_conditions(&groups).unwrap());

        let groups = vec![vec![
            BranchCondition::new(TextContains, "foo", "oo"),
            BranchCondition::single(BooleanIsTrue, false),
        ]];
        assert!(!evaluate_conditions(&groups).unwrap());
        assert!(!evaluate_conditions(&[]).unwrap());
    }

    #[test]
    fn test_text_operators() {
        assert!(check(TextContains, json!("foo"), json!("oo")));
        assert!(!check(TextContains, json!("foo"), json!("bar")));
        assert!(check(TextDoesNotContain, json!("foo"), json!("bar")));
        assert!(!check(TextDoesNotContain, json!("foo"), json!("oo")));
        assert!(check(TextExactlyMatches, json!("Foo"), json!("foo")));
        assert!(!check(TextExactlyMatches, json!("foo"), json!("food")));
        assert!(check(TextDoesNotExactlyMatch, json!("foo"), json!("food")));
        assert!(!check(TextDoesNotExactlyMatch, json!("foo"), json!("FOO")));
        assert!(check(TextStartWith, json!("foobar"), json!("foo")));
        assert!(!check(TextStartWith, json!("foobar"), json!("bar")));
        assert!(check(TextDoesNotStartWith, json!("foobar"), json!("bar")));
        assert!(!check(TextDoesNotStartWith, json!("foobar"), json!("foo")));
        assert!(check(TextEndsWith, json!("foobar"), json!("bar")));
        assert!(!check(TextEndsWith, json!("foobar"), json!("foo")));
        assert!(check(TextDoesNotEndWith, json!("foobar"), json!("foo")));
        assert!(!check(TextDoesNotEndWith, json!("foobar"), json!("bar")));
    }

    #[test]
    fn test_case_sensitivity() {
        let condition = BranchCondition::new(TextExactlyMatches, "Foo", "foo").case_sensitive(true);
        assert!(!evaluate_condition(&condition).unwrap());
        assert!(check(TextContains, json!("HELLO"), json!("ell")));
    }

    #[test]
    fn test_number_operators() {
        assert!(check(NumberIsGreaterThan, json!(10), json!(5)));
        assert!(!check(NumberIsGreaterThan, json!(5), json!(10)));
        assert!(check(NumberIsGreaterThan, json!("10"), json!(5)));
        assert!(check(NumberIsLessThan, json!("2.5"), json!("10")));
        assert!(!check(NumberIsLessThan, json!(10), json!(2)));
    }

    #[test]
    fn test_numeric_coercion_keeps_non_numeric_strings() {
        assert_eq!(parse_string_to_number(&json!("abc")), NumericOperand::Text("abc".into()));
        assert_eq!(parse_string_to_number(&json!(" 42 ")), NumericOperand::Number(42.0));

        // string against number never holds, in either direction
        assert!(!check(NumberIsGreaterThan, json!("abc"), json!(5)));
        assert!(!check(NumberIsLessThan, json!("abc"), json!(5)));
        // two non-numeric strings compare as text
        assert!(check(NumberIsGreaterThan, json!("abc"), json!("abb")));
    }

    #[test]
    fn test_boolean_and_existence_operators() {
        assert!(check_single(BooleanIsTrue, json!(true)));
        assert!(!check_single(BooleanIsTrue, json!(false)));
        assert!(check_single(BooleanIsFalse, json!(false)));
        assert!(!check_single(BooleanIsFalse, json!(true)));
        assert!(!check_single(BooleanIsTrue, json!("false")));
        assert!(check_single(Exists, json!("x")));
        assert!(!check_single(Exists, json!("")));
        assert!(!check_single(Exists, Value::Null));
        assert!(check_single(DoesNotExist, Value::Null));
        assert!(!check_single(DoesNotExist, json!(0)));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let groups = vec![vec![BranchCondition::single(
            BranchOperator::Unknown("TEXT_RHYMES_WITH".into()),
            "a",
        )]];
        assert_eq!(
            evaluate_conditions(&groups),
            Err(StepError::UnknownOperator("TEXT_RHYMES_WITH".into()))
        );
    }
}
