// Environment variable overrides

use serde_json::{Map, Value};
use std::env;

/// Default prefix for orderhook settings in the environment.
pub const DEFAULT_PREFIX: &str = "ORDERHOOK";

/// Separator between the prefix and the nested key segments.
pub const SEPARATOR: &str = "__";

/// Overlays environment variables onto a configuration tree.
///
/// `ORDERHOOK__DELIVERY__URL=https://...` sets `delivery.url`. Values that
/// parse as JSON scalars (`true`, `42`, `1.5`) keep their type, anything else
/// is taken as a string.
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Collect `(path, value)` overrides from the process environment
    pub fn load(&self) -> Vec<(Vec<String>, Value)> {
        self.load_from(env::vars())
    }

    /// Collect overrides from an explicit list of variables
    pub fn load_from<I>(&self, vars: I) -> Vec<(Vec<String>, Value)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{}{}", self.prefix, SEPARATOR);
        let mut overrides: Vec<(Vec<String>, Value)> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(&marker)?;
                let path: Vec<String> = rest
                    .split(SEPARATOR)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_lowercase())
                    .collect();
                if path.is_empty() {
                    return None;
                }
                Some((path, parse_scalar(&value)))
            })
            .collect();

        // Deterministic application order regardless of env iteration order
        overrides.sort_by(|a, b| a.0.cmp(&b.0));
        overrides
    }

    /// Apply overrides onto `tree`, creating intermediate tables as needed
    pub fn apply(tree: &mut Value, overrides: Vec<(Vec<String>, Value)>) {
        for (path, value) in overrides {
            set_path(tree, &path, value);
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => v,
        _ => Value::String(raw.to_string()),
    }
}

fn set_path(tree: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.clone(), value);
    }
}
