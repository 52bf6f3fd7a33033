use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// Deepest nesting a JSON stream may have and still load.
///
/// Matches the recursion limit of `serde_json`'s deserializer.
pub const MAX_STREAM_DEPTH: usize = 127;

// -----------------------------------------------------------------------------
// Pickled

/// The serialized form of an object graph.
///
/// Every node is self-describing, so a stream can be loaded without any
/// knowledge of the dispatch table used to produce it. The wire encoding
/// is JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pickled {
    None,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float")] f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Pickled>),
    Tuple(Vec<Pickled>),
    Dict(Vec<(Pickled, Pickled)>),
    /// Attribute `name` of module `module`, resolved on load.
    Global { module: String, name: String },
    Module { name: String },
    /// Result of calling the registered function `func` with `args`.
    Reduce { func: String, args: Vec<Pickled> },
    /// Records `value` under `id` for later [`Pickled::Get`] nodes.
    Memo { id: u32, value: Box<Pickled> },
    Get(u32),
}

impl Pickled {
    /// Nesting depth of this node once encoded as JSON.
    pub fn stream_depth(&self) -> usize {
        fn deepest<'a>(items: impl Iterator<Item = &'a Pickled>) -> usize {
            items.map(Pickled::stream_depth).max().unwrap_or(0)
        }

        match self {
            Pickled::None => 0,
            Pickled::Bool(_)
            | Pickled::Int(_)
            | Pickled::Float(_)
            | Pickled::Str(_)
            | Pickled::Get(_) => 1,
            Pickled::Bytes(_) | Pickled::Global { .. } | Pickled::Module { .. } => 2,
            Pickled::List(items) | Pickled::Tuple(items) => 2 + deepest(items.iter()),
            Pickled::Dict(pairs) => {
                3 + deepest(pairs.iter().flat_map(|(key, value)| [key, value]))
            }
            Pickled::Reduce { args, .. } => 3 + deepest(args.iter()),
            Pickled::Memo { value, .. } => 2 + value.stream_depth(),
        }
    }
}

// Non-finite floats have no JSON number form and are written as strings.
mod float {
    use alloc::string::String;
    use core::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    const NAN: &str = "nan";
    const INF: &str = "inf";
    const NEG_INF: &str = "-inf";

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(INF)
        } else {
            serializer.serialize_str(NEG_INF)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"nan\", \"inf\", \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                NAN => Ok(f64::NAN),
                INF => Ok(f64::INFINITY),
                NEG_INF => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<f64, E> {
            self.visit_str(&v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Pickled;

    #[test]
    fn non_finite_floats_are_strings() {
        let nodes = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1.5].map(Pickled::Float);
        let text = serde_json::to_string(&nodes).unwrap();
        assert_eq!(
            text,
            r#"[{"float":"nan"},{"float":"inf"},{"float":"-inf"},{"float":1.5}]"#
        );

        let back: Vec<Pickled> = serde_json::from_str(&text).unwrap();
        assert!(matches!(back[0], Pickled::Float(v) if v.is_nan()));
        assert_eq!(back[1..], nodes[1..]);
        assert!(serde_json::from_str::<Pickled>(r#"{"float":"huge"}"#).is_err());
    }

    #[test]
    fn depth_matches_encoding() {
        let leaf = Pickled::Int(1);
        assert_eq!(leaf.stream_depth(), 1);

        let list = Pickled::List(vec![Pickled::List(vec![leaf.clone()])]);
        assert_eq!(list.stream_depth(), 5);

        let memo = Pickled::Memo {
            id: 0,
            value: Box::new(Pickled::Reduce {
                func: "f".into(),
                args: vec![leaf],
            }),
        };
        assert_eq!(memo.stream_depth(), 6);
    }
}
