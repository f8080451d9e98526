//! Validation reports

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value NetBox holds and the value MaaS (or the hardware) says it should
/// hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub current: Value,
    pub expected: Value,
}

impl Discrepancy {
    pub fn new(current: impl Serialize, expected: impl Serialize) -> Self {
        Self {
            current: serde_json::to_value(current).unwrap_or(Value::Null),
            expected: serde_json::to_value(expected).unwrap_or(Value::Null),
        }
    }

    /// The expected value as a string, if it is one.
    pub fn expected_str(&self) -> Option<&str> {
        self.expected.as_str()
    }
}

/// Discrepancies keyed by NetBox object id (device or interface, depending
/// on the field checked).
pub type Report = BTreeMap<i64, Discrepancy>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discrepancy_new() {
        let d = Discrepancy::new(None::<String>, "S123");
        assert_eq!(d.current, Value::Null);
        assert_eq!(d.expected_str(), Some("S123"));

        let d = Discrepancy::new(Vec::<String>::new(), vec!["eno1"]);
        assert_eq!(d.current, json!([]));
        assert_eq!(d.expected, json!(["eno1"]));
    }
}
