//! Value representation
//!
//! Three views of a value live here: the compile-time [`Constant`] used for folding,
//! the runtime type tag [`Kind`] written into every slot, and the [`Nbt`] storage tree
//! that the target environment reads and writes.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::ast::BinaryOp;

/// Insertion-ordered map used for compounds and unit tables.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Runtime type tag stored in a slot's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Function,
    Undefined,
    Null,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::String,
        Kind::Number,
        Kind::Boolean,
        Kind::Object,
        Kind::Array,
        Kind::Function,
        Kind::Undefined,
        Kind::Null,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Function => "function",
            Kind::Undefined => "undefined",
            Kind::Null => "null",
        }
    }

    pub fn parse(tag: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Whether values of this kind hold a heap or slot address rather than a primitive
    pub fn is_reference(self) -> bool {
        matches!(self, Kind::Object | Kind::Array | Kind::Function)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal known without emitting runtime instructions
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Constant {
    pub fn kind(&self) -> Kind {
        match self {
            Constant::Undefined => Kind::Undefined,
            Constant::Null => Kind::Null,
            Constant::Boolean(_) => Kind::Boolean,
            Constant::Number(_) => Kind::Number,
            Constant::String(_) => Kind::String,
        }
    }

    /// ToBoolean
    pub fn is_truthy(&self) -> bool {
        match self {
            Constant::Undefined | Constant::Null => false,
            Constant::Boolean(b) => *b,
            Constant::Number(n) => *n != 0.0 && !n.is_nan(),
            Constant::String(s) => !s.is_empty(),
        }
    }

    /// ToNumber
    pub fn to_number(&self) -> f64 {
        match self {
            Constant::Undefined => f64::NAN,
            Constant::Null => 0.0,
            Constant::Boolean(true) => 1.0,
            Constant::Boolean(false) => 0.0,
            Constant::Number(n) => *n,
            Constant::String(s) => string_to_number(s),
        }
    }

    /// ToString
    pub fn to_js_string(&self) -> String {
        match self {
            Constant::Undefined => "undefined".to_string(),
            Constant::Null => "null".to_string(),
            Constant::Boolean(b) => b.to_string(),
            Constant::Number(n) => number_to_string(*n),
            Constant::String(s) => s.clone(),
        }
    }

    /// Equality by raw value: same kind and same payload
    pub fn raw_equals(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a == b,
            (a, b) => a == b,
        }
    }

    /// The `{type, value}` compound a slot holds for this constant
    pub fn to_slot(&self) -> Nbt {
        Nbt::slot(self.kind(), self.to_nbt(), None)
    }

    /// The payload written into a slot's `value` field
    pub fn to_nbt(&self) -> Nbt {
        match self {
            Constant::Undefined | Constant::Null => Nbt::Int(0),
            Constant::Boolean(b) => Nbt::Bool(*b),
            Constant::Number(n) => Nbt::Double(*n),
            Constant::String(s) => Nbt::String(s.clone()),
        }
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Boolean(b)
    }
}

impl From<f64> for Constant {
    fn from(n: f64) -> Self {
        Constant::Number(n)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::String(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Constant::String(s)
    }
}

/// Format a number the way JavaScript's ToString does for the common cases
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // Rust renders `1e21` / `1e-7`; JavaScript wants an explicit exponent sign
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}

/// ToNumber for strings: trimmed decimal literal, empty string is zero
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// A node of the target environment's storage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Nbt {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    List(Vec<Nbt>),
    Compound(FxIndexMap<String, Nbt>),
}

impl Default for Nbt {
    fn default() -> Self {
        Nbt::compound()
    }
}

impl Nbt {
    pub fn compound() -> Nbt {
        Nbt::Compound(FxIndexMap::default())
    }

    /// Build a slot compound `{type, value, function}`
    pub fn slot(kind: Kind, value: Nbt, function: Option<&str>) -> Nbt {
        let mut map = FxIndexMap::default();
        map.insert("type".to_string(), Nbt::String(kind.as_str().to_string()));
        map.insert("value".to_string(), value);
        if let Some(function) = function {
            map.insert("function".to_string(), Nbt::String(function.to_string()));
        }
        Nbt::Compound(map)
    }

    pub fn undefined_slot() -> Nbt {
        Constant::Undefined.to_slot()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Nbt::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Nbt::Double(n) => Some(*n),
            Nbt::Int(n) => Some(f64::from(*n)),
            Nbt::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Nbt::Bool(b) => Some(*b),
            Nbt::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Nbt>> {
        match self {
            Nbt::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Nbt> {
        match self {
            Nbt::Compound(map) => map.get(key),
            _ => None,
        }
    }

    /// Resolve a dotted path below this node
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Nbt> {
        path.iter().try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Write `value` at `path`, creating intermediate compounds. Returns false when an
    /// intermediate node exists but is not a compound.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], value: Nbt) -> bool {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return true;
        };
        let mut node = self;
        for key in parents {
            let Nbt::Compound(map) = node else {
                return false;
            };
            node = map
                .entry(key.as_ref().to_string())
                .or_insert_with(Nbt::compound);
        }
        match node {
            Nbt::Compound(map) => {
                map.insert(last.as_ref().to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Append to the list at `path`, creating it when absent
    pub fn append_path<S: AsRef<str>>(&mut self, path: &[S], value: Nbt) -> bool {
        if self.get_path(path).is_none() && !self.set_path(path, Nbt::List(Vec::new())) {
            return false;
        }
        let mut node = self;
        for key in path {
            let Nbt::Compound(map) = node else {
                return false;
            };
            let Some(next) = map.get_mut(key.as_ref()) else {
                return false;
            };
            node = next;
        }
        match node {
            Nbt::List(items) => {
                items.push(value);
                true
            }
            _ => false,
        }
    }

    /// Render as SNBT, the literal syntax of the target's commands
    pub fn to_snbt(&self) -> String {
        let mut out = String::new();
        self.write_snbt(&mut out);
        out
    }

    fn write_snbt(&self, out: &mut String) {
        match self {
            Nbt::Bool(b) => out.push_str(if *b { "1b" } else { "0b" }),
            Nbt::Int(n) => out.push_str(&n.to_string()),
            Nbt::Double(n) => {
                if n.is_finite() {
                    out.push_str(&format!("{:?}d", n));
                } else {
                    // SNBT has no NaN/Infinity literal
                    out.push_str("0.0d");
                }
            }
            Nbt::String(s) => out.push_str(&quote_snbt(s)),
            Nbt::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_snbt(out);
                }
                out.push(']');
            }
            Nbt::Compound(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&snbt_key(key));
                    out.push(':');
                    value.write_snbt(out);
                }
                out.push('}');
            }
        }
    }
}

/// Quote a string literal for SNBT
pub fn quote_snbt(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a compound key or path segment, quoting when needed
pub fn snbt_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'));
    if bare {
        key.to_string()
    } else {
        quote_snbt(key)
    }
}

// ============ OPERATORS ============

/// Evaluate a binary operator on two constants. Returns `None` for operators
/// that have no meaning on primitives (`in`, `instanceof`).
pub fn binary(op: BinaryOp, left: &Constant, right: &Constant) -> Option<Constant> {
    let number = |f: fn(f64, f64) -> f64| Constant::Number(f(left.to_number(), right.to_number()));
    let int32 = |f: fn(i32, i32) -> i32| {
        Constant::Number(f64::from(f(to_int32(left.to_number()), to_int32(right.to_number()))))
    };

    let result = match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => number(|a, b| a - b),
        BinaryOp::Mul => number(|a, b| a * b),
        BinaryOp::Div => number(|a, b| a / b),
        BinaryOp::Mod => number(|a, b| a % b),
        BinaryOp::Exp => number(power),
        BinaryOp::Eq => Constant::Boolean(loose_equals(left, right)),
        BinaryOp::NotEq => Constant::Boolean(!loose_equals(left, right)),
        BinaryOp::StrictEq => Constant::Boolean(left.raw_equals(right)),
        BinaryOp::StrictNotEq => Constant::Boolean(!left.raw_equals(right)),
        BinaryOp::Lt => Constant::Boolean(compare(left, right, |o| o.is_lt())),
        BinaryOp::LtEq => Constant::Boolean(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Constant::Boolean(compare(left, right, |o| o.is_gt())),
        BinaryOp::GtEq => Constant::Boolean(compare(left, right, |o| o.is_ge())),
        BinaryOp::BitAnd => int32(|a, b| a & b),
        BinaryOp::BitOr => int32(|a, b| a | b),
        BinaryOp::BitXor => int32(|a, b| a ^ b),
        BinaryOp::LShift => int32(|a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::RShift => int32(|a, b| a.wrapping_shr(b as u32 & 31)),
        BinaryOp::URShift => {
            let a = to_int32(left.to_number()) as u32;
            let b = to_int32(right.to_number()) as u32 & 31;
            Constant::Number(f64::from(a >> b))
        }
        BinaryOp::In | BinaryOp::Instanceof => return None,
    };
    Some(result)
}

/// `+`: concatenation when either side is a string, numeric addition otherwise
pub fn add(left: &Constant, right: &Constant) -> Constant {
    if matches!(left, Constant::String(_)) || matches!(right, Constant::String(_)) {
        Constant::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
    } else {
        Constant::Number(left.to_number() + right.to_number())
    }
}

/// `==`
pub fn loose_equals(left: &Constant, right: &Constant) -> bool {
    let nullish = |c: &Constant| matches!(c, Constant::Undefined | Constant::Null);
    if left.kind() == right.kind() {
        return left.raw_equals(right);
    }
    if nullish(left) || nullish(right) {
        return nullish(left) && nullish(right);
    }
    left.to_number() == right.to_number()
}

/// Relational comparison: lexicographic for two strings, numeric otherwise (NaN compares false)
pub fn compare(left: &Constant, right: &Constant, test: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Constant::String(a), Constant::String(b)) = (left, right) {
        return test(a.as_str().cmp(b.as_str()));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .is_some_and(test)
}

/// `**` with the JavaScript NaN cases
pub fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let modulo = n.trunc() % 4_294_967_296.0;
    let positive = if modulo < 0.0 {
        modulo + 4_294_967_296.0
    } else {
        modulo
    };
    positive as u32 as i32
}

/// `typeof` for a runtime kind
pub fn type_of(kind: Kind) -> &'static str {
    match kind {
        Kind::Array | Kind::Null | Kind::Object => "object",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert!(string_to_number("abc").is_nan());
        assert_eq!(string_to_number("1e3"), 1000.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Constant::Number(0.0).is_truthy());
        assert!(!Constant::String(String::new()).is_truthy());
        assert!(Constant::String("0".into()).is_truthy());
        assert!(!Constant::Null.is_truthy());
        assert!(Constant::Number(-1.0).is_truthy());
    }

    #[test]
    fn test_set_and_get_path() {
        let mut root = Nbt::compound();
        assert!(root.set_path(&["s1", "value"], Nbt::Double(3.0)));
        assert_eq!(root.get_path(&["s1", "value"]), Some(&Nbt::Double(3.0)));
        assert!(!root.set_path(&["s1", "value", "deep"], Nbt::Int(1)));
    }

    #[test]
    fn test_append_creates_list() {
        let mut root = Nbt::compound();
        assert!(root.append_path(&["h1", "elements"], Nbt::Int(1)));
        assert!(root.append_path(&["h1", "elements"], Nbt::Int(2)));
        assert_eq!(
            root.get_path(&["h1", "elements"]),
            Some(&Nbt::List(vec![Nbt::Int(1), Nbt::Int(2)]))
        );
    }

    #[test]
    fn test_snbt_rendering() {
        let slot = Constant::String("a\"b".into()).to_slot();
        assert_eq!(slot.to_snbt(), r#"{type:"string",value:"a\"b"}"#);
        assert_eq!(Nbt::Double(1.0).to_snbt(), "1.0d");
        let mut map = FxIndexMap::default();
        map.insert("my key".to_string(), Nbt::Bool(true));
        assert_eq!(Nbt::Compound(map).to_snbt(), r#"{"my key":1b}"#);
    }
    #[test]
    fn test_binary_folding() {
        let n = |v: f64| Constant::Number(v);
        assert_eq!(binary(BinaryOp::Add, &n(2.0), &n(3.0)), Some(n(5.0)));
        assert_eq!(
            binary(BinaryOp::Add, &"a".into(), &n(1.0)),
            Some(Constant::String("a1".into()))
        );
        assert_eq!(binary(BinaryOp::Mod, &n(-7.0), &n(3.0)), Some(n(-1.0)));
        assert_eq!(binary(BinaryOp::Sub, &"5".into(), &n(2.0)), Some(n(3.0)));
        assert_eq!(binary(BinaryOp::LShift, &n(1.0), &n(33.0)), Some(n(2.0)));
        assert_eq!(binary(BinaryOp::URShift, &n(-1.0), &n(28.0)), Some(n(15.0)));
        assert_eq!(binary(BinaryOp::In, &n(1.0), &n(1.0)), None);
    }

    #[test]
    fn test_equality_and_comparison() {
        assert!(loose_equals(&Constant::Null, &Constant::Undefined));
        assert!(loose_equals(&Constant::Number(1.0), &"1".into()));
        assert!(!Constant::Number(1.0).raw_equals(&"1".into()));
        assert!(!loose_equals(&Constant::Null, &Constant::Number(0.0)));
        assert!(compare(&"a".into(), &"b".into(), |o| o.is_lt()));
        assert!(!compare(&Constant::Undefined, &Constant::Number(1.0), |o| o.is_lt()));
        assert!(power(1.0, f64::INFINITY).is_nan());
    }
}
