//! The closed value model that every call argument and result is expressed in.
//!
//! Values fall into a fixed set of [`Shape`]s, which select the comparison
//! rule used by the [`Comparator`](crate::compare::Comparator).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A cacheable value.
///
/// The derived `PartialEq` is strict (ordered sets, exact floats). Use the
/// [`Comparator`](crate::compare::Comparator) for tolerance-aware comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A text string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An ordered, growable collection.
    List(Vec<Value>),
    /// An ordered, fixed collection.
    Tuple(Vec<Value>),
    /// An unordered collection; element order is not significant.
    Set(Vec<Value>),
    /// A string-keyed mapping.
    Map(BTreeMap<String, Value>),
    /// A one-dimensional labeled sequence.
    Series(Series),
    /// A tabular dataset.
    Frame(Frame),
}

impl Value {
    /// Returns a short name for the kind of value, used in diff output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Series(_) => "series",
            Value::Frame(_) => "frame",
        }
    }

    /// Returns a display adapter that quotes strings, as used for nested values.
    pub fn repr(&self) -> Repr<'_> {
        Repr(self)
    }

    /// Returns the float payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    // Debug keeps a trailing ".0" on whole numbers.
    write!(f, "{v:?}")
}

fn write_items<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl Iterator<Item = &'a Value>,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write_float(f, *v),
            Value::Str(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "b\"{}\"", v.escape_ascii()),
            Value::List(items) => write_items(f, "[", items.iter(), "]"),
            Value::Tuple(items) => write_items(f, "(", items.iter(), ")"),
            Value::Set(items) => write_items(f, "{", items.iter(), "}"),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {}", v.repr())?;
                }
                f.write_str("}")
            }
            Value::Series(s) => write!(f, "{s}"),
            Value::Frame(frame) => write!(f, "{frame}"),
        }
    }
}

/// Display adapter that renders strings quoted and everything else as
/// [`Value`]'s `Display`.
pub struct Repr<'a>(&'a Value);

impl fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Str(v) => write!(f, "{v:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Value::Series(s)
    }
}

impl From<Frame> for Value {
    fn from(frame: Frame) -> Self {
        Value::Frame(frame)
    }
}

/// Element type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 64-bit floats; NaN marks a missing value.
    Float64,
    /// 64-bit signed integers.
    Int64,
    /// Booleans.
    Bool,
    /// Text.
    Str,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float64 => "float64",
            DType::Int64 => "int64",
            DType::Bool => "bool",
            DType::Str => "str",
        };
        f.write_str(name)
    }
}

/// Typed storage for a single dataset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Float values; NaN marks a missing value.
    Float(Vec<f64>),
    /// Integer values.
    Int(Vec<i64>),
    /// Boolean values.
    Bool(Vec<bool>),
    /// String values.
    Str(Vec<String>),
}

impl ColumnData {
    /// Returns the element type of this column.
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Float(_) => DType::Float64,
            ColumnData::Int(_) => DType::Int64,
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Str(_) => DType::Str,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Str(v) => v.len(),
        }
    }

    /// Returns `true` if the column has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `pos` as a [`Value`].
    pub fn get(&self, pos: usize) -> Option<Value> {
        match self {
            ColumnData::Float(v) => v.get(pos).map(|x| Value::Float(*x)),
            ColumnData::Int(v) => v.get(pos).map(|x| Value::Int(*x)),
            ColumnData::Bool(v) => v.get(pos).map(|x| Value::Bool(*x)),
            ColumnData::Str(v) => v.get(pos).map(|x| Value::Str(x.clone())),
        }
    }
}

fn range_index(len: usize) -> Vec<Value> {
    (0..len as i64).map(Value::Int).collect()
}

/// A one-dimensional labeled sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Optional series name.
    pub name: Option<String>,
    /// Row labels, one per element.
    pub index: Vec<Value>,
    /// The values.
    pub data: ColumnData,
}

impl Series {
    /// Creates an unnamed series with a `0..n` index.
    pub fn new(data: ColumnData) -> Self {
        Self {
            name: None,
            index: range_index(data.len()),
            data,
        }
    }

    /// Sets the series name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the index.
    pub fn with_index(mut self, index: Vec<Value>) -> Self {
        self.index = index;
        self
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the series has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Series({name}, {})", self.len()),
            None => write!(f, "Series({})", self.len()),
        }
    }
}

/// A named column of a [`Frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its frame.
    pub name: String,
    /// Column values.
    pub data: ColumnData,
}

/// A tabular dataset: rows by named, typed columns sharing one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Row labels.
    pub index: Vec<Value>,
    /// Columns in display order.
    pub columns: Vec<Column>,
}

impl Frame {
    /// Creates an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing any existing column with the same name.
    ///
    /// The first column added to a frame without an index gives it a
    /// `0..n` index.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        let name = name.into();
        if self.columns.is_empty() && self.index.is_empty() {
            self.index = range_index(data.len());
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.data = data,
            None => self.columns.push(Column { name, data }),
        }
        self
    }

    /// Replaces the row index.
    pub fn with_index(mut self, index: Vec<Value>) -> Self {
        self.index = index;
        self
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}x{})", self.len(), self.columns.len())
    }
}

/// Structural category of a value, selecting its comparison rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A tabular dataset.
    Frame,
    /// A one-dimensional labeled sequence.
    Series,
    /// A string-keyed mapping.
    Mapping,
    /// A list or tuple.
    Sequence,
    /// An unordered set.
    Set,
    /// Anything else; compared by serialized bytes.
    Opaque,
}

impl Shape {
    /// Classifies a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Frame(_) => Shape::Frame,
            Value::Series(_) => Shape::Series,
            Value::Map(_) => Shape::Mapping,
            Value::List(_) | Value::Tuple(_) => Shape::Sequence,
            Value::Set(_) => Shape::Set,
            _ => Shape::Opaque,
        }
    }

    /// Returns `true` for plain collections (mappings, sequences, sets).
    pub fn is_collection(self) -> bool {
        matches!(self, Shape::Mapping | Shape::Sequence | Shape::Set)
    }
}

/// Arguments of a single call: ordered positional values plus uniquely
/// named values.
///
/// Named arguments keep their insertion order here; fingerprinting sorts
/// them by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl CallArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds arguments from parts. A repeated name keeps its last value.
    pub fn from_parts(positional: Vec<Value>, named: Vec<(String, Value)>) -> Self {
        let mut args = Self {
            positional,
            named: Vec::with_capacity(named.len()),
        };
        for (name, value) in named {
            args.set_named(name, value);
        }
        args
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a named argument, replacing any previous value for that name.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_named(name.into(), value.into());
        self
    }

    fn set_named(&mut self, name: String, value: Value) {
        match self.named.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.named.push((name, value)),
        }
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Named arguments in insertion order.
    pub fn named(&self) -> &[(String, Value)] {
        &self.named
    }

    /// Returns the positional argument at `pos`.
    pub fn get(&self, pos: usize) -> Option<&Value> {
        self.positional.get(pos)
    }

    /// Returns the named argument `name`.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns `true` if there are no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}
