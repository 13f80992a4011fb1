//! Content fingerprinting for voting
//!
//! Every vote compares results by fingerprint only, so two results must hash
//! equal exactly when they are structurally equal. [`ResultValue`] carries a
//! canonical serialization (sorted keys, normalized numbers, no whitespace)
//! and [`fingerprint`] hashes it with SHA-256.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 2^127. Integral floats in `[-2^127, 2^127)` fit `i128` exactly and fold
/// into its form; anything larger cannot equal an `Int`.
const INTEGRAL_FLOAT_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Structured result produced by an external solver.
///
/// `Map` is ordered by key, so insertion order never leaks into the
/// canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ResultValue {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Text(String),
    List(Vec<ResultValue>),
    Map(BTreeMap<String, ResultValue>),
}

impl ResultValue {
    /// Build a map value from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ResultValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether the value carries no content (null, empty text, list or map).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => false,
        }
    }

    /// Canonical textual form used as hash input.
    pub fn canonical_string(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => write_float(*f, out),
            Self::Text(s) => write_text(s, out),
            Self::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(entries) => {
                out.push('{');
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    write_text(key, out);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_float(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "Infinity" } else { "-Infinity" });
    } else if f.fract() == 0.0 && (-INTEGRAL_FLOAT_LIMIT..INTEGRAL_FLOAT_LIMIT).contains(&f) {
        // 1.0 and 1 are the same number; -0.0 folds to 0
        let _ = write!(out, "{}", f as i128);
    } else {
        let _ = write!(out, "{f:?}");
    }
}

fn write_text(s: &str, out: &mut String) {
    // serde_json escaping of a plain &str cannot fail
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
    }
}

impl From<serde_json::Value> for ResultValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Self::Int(u as i128)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ResultValue> for serde_json::Value {
    fn from(value: ResultValue) -> Self {
        match value {
            ResultValue::Null => serde_json::Value::Null,
            ResultValue::Bool(b) => serde_json::Value::Bool(b),
            ResultValue::Int(i) => {
                if let Ok(small) = i64::try_from(i) {
                    serde_json::Value::from(small)
                } else if let Ok(unsigned) = u64::try_from(i) {
                    serde_json::Value::from(unsigned)
                } else {
                    serde_json::Value::from(i as f64)
                }
            }
            ResultValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ResultValue::Text(s) => serde_json::Value::String(s),
            ResultValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            ResultValue::Map(entries) => serde_json::Value::Object(
                entries.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ResultValue {
    fn from(i: i64) -> Self {
        Self::Int(i as i128)
    }
}

impl From<f64> for ResultValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for ResultValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// SHA-256 hex digest of a result's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint carried by synthetic failure judgments. Never produced by
    /// [`fingerprint`].
    pub fn failed() -> Self {
        Self(String::new())
    }

    pub fn is_failed(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(16)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_failed() {
            write!(f, "<failed>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Fingerprint a result.
pub fn fingerprint(result: &ResultValue) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(result.canonical_string().as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
