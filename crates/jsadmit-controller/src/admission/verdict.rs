use serde_json::Value;

/// A hook's opinion, read from its returned object.
///
/// Anything that is not an object carries no opinion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookVerdict {
    /// `Allowed`; absent means no opinion.
    pub allowed: Option<bool>,
    pub message: Option<String>,
    /// `Result`: the proposed object (mutate only).
    pub result: Option<Value>,
}

impl HookVerdict {
    pub fn from_result(result: Option<Value>) -> Self {
        let Some(Value::Object(mut map)) = result else {
            return Self::default();
        };
        Self {
            allowed: map.get("Allowed").and_then(Value::as_bool),
            message: map
                .get("Message")
                .and_then(Value::as_str)
                .map(str::to_string),
            result: map.remove("Result").filter(Value::is_object),
        }
    }

    pub fn denies(&self) -> bool {
        self.allowed == Some(false)
    }
}
