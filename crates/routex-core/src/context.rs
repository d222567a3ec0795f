use bytes::Bytes;
use serde_json::{Map, Value};

/// Per-request variables handed to data queries and engines.
pub type Context = Map<String, Value>;

/// The value threaded through a file's stages: a context until the
/// compilation stage turns it into a body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Context(Context),
    Body(Bytes),
}

impl Payload {
    pub fn into_context(self) -> Option<Context> {
        match self {
            Payload::Context(ctx) => Some(ctx),
            Payload::Body(_) => None,
        }
    }

    pub fn into_body(self) -> Option<Bytes> {
        match self {
            Payload::Body(body) => Some(body),
            Payload::Context(_) => None,
        }
    }
}

/// Merges layers into a fresh context; later layers win on key collision.
///
/// Request contexts are built as `merge([globals, params, queried])`, so
/// queried data overrides route parameters, which override globals.
pub fn merge<'a>(layers: impl IntoIterator<Item = &'a Context>) -> Context {
    let mut merged = Context::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Builds a context from string captures (route parameters).
pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Context {
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_layers_override() {
        let a = json!({"a": 1, "keep": true}).as_object().cloned().unwrap();
        let b = json!({"a": 2}).as_object().cloned().unwrap();
        let merged = merge([&a, &b]);
        assert_eq!(merged.get("a"), Some(&json!(2)));
        assert_eq!(merged.get("keep"), Some(&json!(true)));
    }
}
