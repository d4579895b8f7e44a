//! Flatten nested secret documents into property keys
//!
//! Objects become dotted keys and arrays become indexed keys:
//!
//! ```rust
//! use serde_json::json;
//! use tenure_secrets::flatten::flatten;
//!
//! let doc = json!({"db": {"hosts": ["a", "b"], "port": 5432}});
//! let flat = flatten(doc.as_object().unwrap());
//!
//! assert_eq!(flat["db.hosts[0]"], json!("a"));
//! assert_eq!(flat["db.hosts[1]"], json!("b"));
//! assert_eq!(flat["db.port"], json!(5432));
//! ```
//!
//! Key order follows document order. Scalars (including `null`) are leaves;
//! empty objects and arrays produce no keys. A map that is already flat is
//! returned unchanged.

use serde_json::{Map, Value};

pub fn flatten(source: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in source {
        flatten_into(&mut flat, key.clone(), value);
    }
    flat
}

fn flatten_into(flat: &mut Map<String, Value>, key: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (child, value) in map {
                flatten_into(flat, format!("{}.{}", key, child), value);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(flat, format!("{}[{}]", key, index), value);
            }
        }
        leaf => {
            flat.insert(key, leaf.clone());
        }
    }
}
