//! Structural comparison and diff explanation.
//!
//! Both values are classified into a [`Shape`]; matching shapes select a
//! structural rule, anything else falls back to comparing serialized bytes.
//! Explanations follow a fixed precedence (shape, type, size, index, values)
//! and stop at the first category that applies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::CodecError;
use crate::value::{ColumnData, Frame, Series, Shape, Value};

/// Default absolute tolerance for float columns.
pub const DEFAULT_EPSILON: f64 = 0.002;

/// Outcome of comparing two values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The values are equal under the comparison rules.
    Equal,
    /// The values differ; the lines explain how.
    Differs(Vec<String>),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Equal`].
    pub fn is_equal(&self) -> bool {
        matches!(self, Verdict::Equal)
    }
}

/// Decides whether two values are equal enough and explains differences.
pub struct Comparator {
    epsilon: f64,
    verbose: bool,
    codec: Arc<dyn Codec>,
}

impl Comparator {
    /// Creates a comparator with the default tolerance. The codec is used
    /// for the byte-level fallback.
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            verbose: false,
            codec,
        }
    }

    /// Sets the absolute tolerance for float columns.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Lists identical mapping items in explanations instead of counting them.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns the float tolerance.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns whether mapping explanations list identical items.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns `true` if the values are equal under their shape's rule.
    ///
    /// Opaque or mismatched shapes are equal only if they serialize to the
    /// same bytes, so semantically equal values with non-deterministic
    /// encodings compare as different.
    pub fn equal(&self, a: &Value, b: &Value) -> Result<bool, CodecError> {
        match (a, b) {
            (Value::Frame(a), Value::Frame(b)) => Ok(self.frames_equal(a, b)),
            (Value::Series(a), Value::Series(b)) => Ok(self.series_equal(a, b)),
            _ if Shape::of(a).is_collection() && Shape::of(b).is_collection() => {
                Ok(values_equal(a, b))
            }
            _ => Ok(self.codec.serialize(a)? == self.codec.serialize(b)?),
        }
    }

    /// Compares and, if the values differ, explains how.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Verdict, CodecError> {
        if self.equal(a, b)? {
            Ok(Verdict::Equal)
        } else {
            Ok(Verdict::Differs(self.explain(a, b)))
        }
    }

    /// Explains how `b` (new) differs from `a` (old).
    ///
    /// Meant to be called when [`equal`](Self::equal) is false; for equal
    /// structured values the explanation is empty.
    pub fn explain(&self, a: &Value, b: &Value) -> Vec<String> {
        match (a, b) {
            (Value::Frame(a), Value::Frame(b)) => self.explain_frames(a, b),
            (Value::Series(a), Value::Series(b)) => self.explain_series(a, b),
            (Value::Map(a), Value::Map(b)) => self.explain_mappings(a, b),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                explain_sequence(a, b)
            }
            (Value::Set(a), Value::Set(b)) => explain_sets(a, b),
            _ => vec![format!("values differ ({} vs {})", a.type_name(), b.type_name())],
        }
    }

    fn floats_close(&self, a: f64, b: f64) -> bool {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => true,
            (false, false) => a == b || (a - b).abs() <= self.epsilon,
            _ => false,
        }
    }

    /// Positions at which two columns differ; length differences count as
    /// differing tail positions.
    fn differing_positions(&self, a: &ColumnData, b: &ColumnData) -> Vec<usize> {
        match (a, b) {
            (ColumnData::Float(x), ColumnData::Float(y)) => {
                positions(x, y, |p, q| self.floats_close(*p, *q))
            }
            (ColumnData::Int(x), ColumnData::Int(y)) => positions(x, y, |p, q| p == q),
            (ColumnData::Bool(x), ColumnData::Bool(y)) => positions(x, y, |p, q| p == q),
            (ColumnData::Str(x), ColumnData::Str(y)) => positions(x, y, |p, q| p == q),
            _ => (0..a.len().max(b.len())).collect(),
        }
    }

    fn columns_equal(&self, a: &ColumnData, b: &ColumnData) -> bool {
        a.dtype() == b.dtype()
            && a.len() == b.len()
            && self.differing_positions(a, b).is_empty()
    }

    fn series_equal(&self, a: &Series, b: &Series) -> bool {
        index_equal(&a.index, &b.index) && self.columns_equal(&a.data, &b.data)
    }

    fn frames_equal(&self, a: &Frame, b: &Frame) -> bool {
        a.column_names() == b.column_names()
            && a.columns
                .iter()
                .zip(&b.columns)
                .all(|(x, y)| x.data.dtype() == y.data.dtype())
            && a.len() == b.len()
            && index_equal(&a.index, &b.index)
            && a.columns
                .iter()
                .zip(&b.columns)
                .all(|(x, y)| self.columns_equal(&x.data, &y.data))
    }

    fn explain_frames(&self, a: &Frame, b: &Frame) -> Vec<String> {
        let a_names: BTreeSet<&str> = a.column_names().into_iter().collect();
        let b_names: BTreeSet<&str> = b.column_names().into_iter().collect();
        if a_names != b_names {
            let mut res = Vec::new();
            let removed: Vec<&str> = a_names.difference(&b_names).copied().collect();
            let added: Vec<&str> = b_names.difference(&a_names).copied().collect();
            if !removed.is_empty() {
                res.push(format!("Removed columns: {}", removed.join(", ")));
            }
            if !added.is_empty() {
                res.push(format!("Added columns: {}", added.join(", ")));
            }
            return res;
        }
        if a.column_names() != b.column_names() {
            return vec![format!(
                "Column order changed from [{}] to [{}]",
                a.column_names().join(", "),
                b.column_names().join(", ")
            )];
        }

        let type_changes: Vec<String> = a
            .columns
            .iter()
            .zip(&b.columns)
            .filter(|(x, y)| x.data.dtype() != y.data.dtype())
            .map(|(x, y)| {
                format!(
                    "Column {} changed type from {} to {}",
                    x.name,
                    x.data.dtype(),
                    y.data.dtype()
                )
            })
            .collect();
        if !type_changes.is_empty() {
            return type_changes;
        }

        if a.len() != b.len() {
            return vec![format!("Data length changed from {} to {}", a.len(), b.len())];
        }

        if !index_equal(&a.index, &b.index) {
            let mut res = vec!["Indexes mismatch:".to_string()];
            res.extend(explain_sequence(&a.index, &b.index));
            return res;
        }

        let mut res = Vec::new();
        for (x, y) in a.columns.iter().zip(&b.columns) {
            res.extend(self.explain_values(&format!("Column {}", x.name), &a.index, &x.data, &y.data));
        }
        res
    }

    fn explain_series(&self, a: &Series, b: &Series) -> Vec<String> {
        if a.data.dtype() != b.data.dtype() {
            return vec![format!(
                "Series changed type from {} to {}",
                a.data.dtype(),
                b.data.dtype()
            )];
        }
        if a.len() != b.len() {
            return vec![format!("Data length changed from {} to {}", a.len(), b.len())];
        }
        if !index_equal(&a.index, &b.index) {
            let mut res = vec!["Indexes mismatch:".to_string()];
            res.extend(explain_sequence(&a.index, &b.index));
            return res;
        }
        self.explain_values("Series", &a.index, &a.data, &b.data)
    }

    fn explain_values(
        &self,
        subject: &str,
        index: &[Value],
        a: &ColumnData,
        b: &ColumnData,
    ) -> Vec<String> {
        let diff = self.differing_positions(a, b);
        let Some(&first) = diff.first() else {
            return Vec::new();
        };
        let label = index
            .get(first)
            .map_or_else(|| first.to_string(), |v| v.repr().to_string());
        let render = |col: &ColumnData| {
            col.get(first)
                .map_or_else(|| "<missing>".to_string(), |v| v.repr().to_string())
        };
        vec![
            format!("{subject} has {} differing value(s)", diff.len()),
            format!(
                "  first one is at index {label}, changed from {} to {}",
                render(a),
                render(b)
            ),
        ]
    }

    fn explain_mappings(
        &self,
        a: &BTreeMap<String, Value>,
        b: &BTreeMap<String, Value>,
    ) -> Vec<String> {
        let mut res = Vec::new();
        let common: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();

        let same: Vec<&String> = common
            .iter()
            .copied()
            .filter(|k| values_equal(&a[*k], &b[*k]))
            .collect();
        if !same.is_empty() {
            if self.verbose {
                res.push("Common items:".to_string());
                res.extend(same.iter().map(|k| format!("  {k:?}: {}", a[*k].repr())));
            } else {
                res.push(format!(
                    "Omitting {} identical items, use verbose mode to show",
                    same.len()
                ));
            }
        }

        let differing: Vec<&String> = common
            .iter()
            .copied()
            .filter(|k| !values_equal(&a[*k], &b[*k]))
            .collect();
        if !differing.is_empty() {
            res.push("Differing items:".to_string());
            for k in differing {
                res.push(format!(
                    "{{{k:?}: {}}} != {{{k:?}: {}}}",
                    a[k].repr(),
                    b[k].repr()
                ));
            }
        }

        let removed: Vec<(&String, &Value)> = a.iter().filter(|(k, _)| !b.contains_key(*k)).collect();
        if !removed.is_empty() {
            res.push("Removed keys:".to_string());
            res.extend(removed.iter().map(|(k, v)| format!("  {k:?}: {}", v.repr())));
        }
        let added: Vec<(&String, &Value)> = b.iter().filter(|(k, _)| !a.contains_key(*k)).collect();
        if !added.is_empty() {
            res.push("Added keys:".to_string());
            res.extend(added.iter().map(|(k, v)| format!("  {k:?}: {}", v.repr())));
        }
        res
    }
}

fn positions<T>(x: &[T], y: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<usize> {
    let mut out: Vec<usize> = x
        .iter()
        .zip(y)
        .enumerate()
        .filter(|(_, (p, q))| !same(p, q))
        .map(|(i, _)| i)
        .collect();
    out.extend(x.len().min(y.len())..x.len().max(y.len()));
    out
}

fn index_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

/// Exact structural equality. Sets ignore order; NaN equals NaN.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            index_equal(x, y)
        }
        (Value::Set(x), Value::Set(y)) => {
            x.len() == y.len()
                && x.iter().all(|v| y.iter().any(|w| values_equal(v, w)))
                && y.iter().all(|w| x.iter().any(|v| values_equal(v, w)))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Value::Series(x), Value::Series(y)) => {
            x.name == y.name
                && index_equal(&x.index, &y.index)
                && columns_identical(&x.data, &y.data)
        }
        (Value::Frame(x), Value::Frame(y)) => {
            index_equal(&x.index, &y.index)
                && x.columns.len() == y.columns.len()
                && x.columns
                    .iter()
                    .zip(&y.columns)
                    .all(|(p, q)| p.name == q.name && columns_identical(&p.data, &q.data))
        }
        _ => a == b,
    }
}

/// Column equality without tolerance: same dtype, same values, same
/// missing-value positions.
fn columns_identical(a: &ColumnData, b: &ColumnData) -> bool {
    match (a, b) {
        (ColumnData::Float(x), ColumnData::Float(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|(p, q)| p == q || (p.is_nan() && q.is_nan()))
        }
        _ => a == b,
    }
}

fn explain_sequence(a: &[Value], b: &[Value]) -> Vec<String> {
    let mut res = Vec::new();
    if let Some(i) = (0..a.len().min(b.len())).find(|&i| !values_equal(&a[i], &b[i])) {
        res.push(format!(
            "At index {i} diff: {} != {}",
            a[i].repr(),
            b[i].repr()
        ));
    }
    if a.len() > b.len() {
        res.push(format!(
            "Left contains more items, first extra item: {}",
            a[b.len()].repr()
        ));
    } else if a.len() < b.len() {
        res.push(format!(
            "Right contains more items, first extra item: {}",
            b[a.len()].repr()
        ));
    }
    res
}

fn explain_sets(a: &[Value], b: &[Value]) -> Vec<String> {
    let mut res = Vec::new();
    let only_a: Vec<&Value> = a.iter().filter(|v| !b.iter().any(|w| values_equal(v, w))).collect();
    let only_b: Vec<&Value> = b.iter().filter(|w| !a.iter().any(|v| values_equal(v, w))).collect();
    if !only_a.is_empty() {
        res.push("Extra items in the left set:".to_string());
        res.extend(only_a.iter().map(|v| v.repr().to_string()));
    }
    if !only_b.is_empty() {
        res.push("Extra items in the right set:".to_string());
        res.extend(only_b.iter().map(|v| v.repr().to_string()));
    }
    res
}
