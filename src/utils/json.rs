use serde_json::Value;

/// Distinguishes "field absent from the PATCH body" from "field explicitly
/// set to null" for nullable columns.
#[derive(Debug)]
pub enum PatchValue {
    Absent,
    Clear,
    Set(String),
}

pub fn string_patch(field: &str, value: Option<&Value>) -> Result<PatchValue, String> {
    match value {
        None => Ok(PatchValue::Absent),
        Some(Value::Null) => Ok(PatchValue::Clear),
        Some(Value::String(s)) => Ok(PatchValue::Set(s.to_owned())),
        Some(other) => Err(format!("{field} must be a string or null, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_absent_null_and_string() {
        assert!(matches!(string_patch("website", None), Ok(PatchValue::Absent)));
        assert!(matches!(
            string_patch("website", Some(&Value::Null)),
            Ok(PatchValue::Clear)
        ));
        assert!(matches!(
            string_patch("website", Some(&json!("https://acme.example"))),
            Ok(PatchValue::Set(_))
        ));
    }

    #[test]
    fn rejects_non_string_values() {
        let err = string_patch("website", Some(&json!(42))).unwrap_err();
        assert!(err.contains("website"));
    }
}
