//! Wire format for operations.

pub mod json;

pub use json::{from_json, to_json, PROTOCOL_VERSION};

use crate::operation::Operation;
use crate::types::{OpError, OpResult};

impl Operation {
    /// Encode as JSON text.
    pub fn serialize(&self) -> String {
        to_json(self).to_string()
    }

    pub fn deserialize(text: &str) -> OpResult<Operation> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|err| OpError::Format(err.to_string()))?;
        from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_round_trip() {
        let op = Operation::list(vec![
            Operation::set_missing(),
            Operation::math("rot", json!([1, 4])).unwrap(),
            Operation::at_index(1, Operation::put("a", json!({"b": [1, 2]}))),
            Operation::copy([("/a", "/b")]).unwrap(),
        ]);
        assert_eq!(Operation::deserialize(&op.serialize()).unwrap(), op);
    }

    #[test]
    fn invalid_text_is_a_format_error() {
        assert!(matches!(Operation::deserialize("{"), Err(OpError::Format(_))));
    }
}
