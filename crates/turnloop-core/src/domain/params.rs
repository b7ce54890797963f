//! Task parameters.

use serde_json::{Map, Value};

/// Named arguments handed to a task body on its first start.
///
/// Insertion order is preserved.
pub type Params = Map<String, Value>;

/// Build `Params` from a JSON object. Anything else yields an empty map.
///
/// ```
/// use serde_json::json;
/// use turnloop_core::domain::params;
///
/// let p = params(json!({ "name": "main" }));
/// assert_eq!(p["name"], "main");
/// ```
pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Bound parameters overlaid with late ones; late values win on collision.
pub fn merge(bound: &Params, late: &Params) -> Params {
    let mut merged = bound.clone();
    for (key, value) in late {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn late_parameters_override_bound_ones() {
        let bound = params(json!({ "inputs": [1, 2], "name": "early" }));
        let late = params(json!({ "name": "late", "extra": true }));

        let merged = merge(&bound, &late);

        assert_eq!(merged["name"], "late");
        assert_eq!(merged["inputs"], json!([1, 2]));
        assert_eq!(merged["extra"], true);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["inputs", "name", "extra"]);
    }

    #[test]
    fn non_object_values_give_empty_params() {
        assert!(params(json!([1, 2, 3])).is_empty());
        assert!(params(Value::Null).is_empty());
    }
}
