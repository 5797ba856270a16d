// crates/scope-gate-core/src/core/filter.rs
// ============================================================================
// Module: Scope Gate Filters
// Description: Boolean record predicates, queryable subsets, and lazy queries.
// Purpose: Express scope results as pushdown filters or key-set membership.
// Dependencies: serde_json, smallvec
// ============================================================================

//! ## Overview
//! Scopes evaluate to one of two shapes. A [`Filter`] is a boolean test that can
//! be pushed straight into a query. A [`Subset`] is a queryable collection
//! that is materialized to a key set and tested with [`Filter::KeyIn`].
//!
//! Filters form a small Boolean algebra with the usual identities: an empty
//! `And` holds, an empty `Or` does not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use smallvec::SmallVec;

use crate::core::identifiers::RecordKey;
use crate::core::identifiers::ResourceType;
use crate::interfaces::StoreError;
use crate::interfaces::SubsetResolver;

// ============================================================================
// SECTION: Field Paths
// ============================================================================

/// Proposed or stored field values keyed by field name.
pub type Values = Map<String, Value>;

/// Dotted relationship path such as `operator.external_company`.
///
/// # Invariants
/// - Holds at least one segment and no segment is empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    /// Path segments in traversal order.
    segments: SmallVec<[String; 4]>,
}

impl FieldPath {
    /// Parses a path separated by `.` or by `__`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let separator = if path.contains("__") { "__" } else { "." };
        let segments: SmallVec<[String; 4]> =
            path.split(separator).map(str::to_string).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            segments,
        })
    }

    /// Creates a single-segment path.
    ///
    /// Returns `None` when the field name is empty.
    #[must_use]
    pub fn field(name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        let mut segments = SmallVec::new();
        segments.push(name.to_string());
        Some(Self {
            segments,
        })
    }

    /// Returns the first segment (the local field).
    #[must_use]
    pub fn first(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Returns the path below the first segment, if any.
    #[must_use]
    pub fn rest(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        })
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; paths are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid field path: `{value}`"))
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Single record as seen by scope evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record key used by membership tests.
    pub key: RecordKey,
    /// Field values; related records may be embedded as objects.
    pub fields: Values,
}

impl Record {
    /// Creates a record without fields.
    #[must_use]
    pub fn new(key: impl Into<RecordKey>) -> Self {
        Self {
            key: key.into(),
            fields: Map::new(),
        }
    }

    /// Adds or replaces a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a top-level field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Follows a relationship path through embedded objects.
    #[must_use]
    pub fn lookup(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments();
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

/// Ordering comparison applied by [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Not equal.
    Ne,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// Atomic test over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field (or relationship endpoint) exists and is not null.
    NotNull(FieldPath),
    /// Field equals the value.
    Equals(FieldPath, Value),
    /// Field compares to the value; incomparable values fail the test.
    Compare(FieldPath, CompareOp, Value),
}

impl Condition {
    /// Evaluates the condition against a record.
    #[must_use]
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::NotNull(path) => record.lookup(path).is_some_and(|value| !value.is_null()),
            Self::Equals(path, expected) => record.lookup(path) == Some(expected),
            Self::Compare(path, op, expected) => {
                let Some(actual) = record.lookup(path) else {
                    return matches!(op, CompareOp::Ne);
                };
                let ordering = compare_values(actual, expected);
                match op {
                    CompareOp::Ne => actual != expected,
                    CompareOp::Lt => ordering == Some(Ordering::Less),
                    CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => ordering == Some(Ordering::Greater),
                    CompareOp::Ge => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            }
        }
    }
}

/// Orders two JSON values of the same primitive kind.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return Some(left.cmp(&right));
            }
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Boolean predicate over records.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record.
    Always,
    /// Matches no record.
    Never,
    /// All children match. Empty `And` matches.
    And(SmallVec<[Box<Self>; 4]>),
    /// At least one child matches. Empty `Or` does not match.
    Or(SmallVec<[Box<Self>; 4]>),
    /// Inverts the child.
    Not(Box<Self>),
    /// Atomic field test.
    Condition(Condition),
    /// Record key is a member of the materialized subset.
    KeyIn(Subset),
}

impl Filter {
    /// Conjunction of filters; `Always` children are dropped.
    #[must_use]
    pub fn and<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut children: SmallVec<[Box<Self>; 4]> = SmallVec::new();
        for filter in filters {
            match filter {
                Self::Always => {}
                Self::Never => return Self::Never,
                other => children.push(Box::new(other)),
            }
        }
        match children.len() {
            0 => Self::Always,
            1 => children.pop().map_or(Self::Always, |child| *child),
            _ => Self::And(children),
        }
    }

    /// Disjunction of filters; `Never` children are dropped.
    #[must_use]
    pub fn or<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut children: SmallVec<[Box<Self>; 4]> = SmallVec::new();
        for filter in filters {
            match filter {
                Self::Never => {}
                Self::Always => return Self::Always,
                other => children.push(Box::new(other)),
            }
        }
        match children.len() {
            0 => Self::Never,
            1 => children.pop().map_or(Self::Never, |child| *child),
            _ => Self::Or(children),
        }
    }

    /// Negates a filter.
    #[must_use]
    pub fn negate(filter: Self) -> Self {
        match filter {
            Self::Always => Self::Never,
            Self::Never => Self::Always,
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Relationship endpoint or field is present and not null.
    #[must_use]
    pub const fn not_null(path: FieldPath) -> Self {
        Self::Condition(Condition::NotNull(path))
    }

    /// Field equals a value.
    #[must_use]
    pub fn equals(path: FieldPath, value: impl Into<Value>) -> Self {
        Self::Condition(Condition::Equals(path, value.into()))
    }

    /// Field compares to a value.
    #[must_use]
    pub fn compare(path: FieldPath, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Condition(Condition::Compare(path, op, value.into()))
    }

    /// Record key is contained in a subset.
    #[must_use]
    pub const fn key_in(subset: Subset) -> Self {
        Self::KeyIn(subset)
    }

    /// Record key equals a single key.
    #[must_use]
    pub fn key_eq(key: RecordKey) -> Self {
        Self::KeyIn(Subset::keys([key]))
    }

    /// Resolves every subset to an explicit key set.
    ///
    /// Scans evaluate the returned filter per record without resolving any
    /// subset again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a subset cannot be materialized.
    pub fn materialize(&self, resolver: &dyn SubsetResolver) -> Result<Self, StoreError> {
        Ok(match self {
            Self::And(children) => Self::And(
                children
                    .iter()
                    .map(|child| child.materialize(resolver).map(Box::new))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Or(children) => Self::Or(
                children
                    .iter()
                    .map(|child| child.materialize(resolver).map(Box::new))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Not(child) => Self::Not(Box::new(child.materialize(resolver)?)),
            Self::KeyIn(subset) => match subset.local_keys() {
                Some(keys) => Self::KeyIn(Subset::Keys(keys)),
                None => Self::KeyIn(Subset::Keys(resolver.resolve_subset(subset)?)),
            },
            Self::Always | Self::Never | Self::Condition(_) => self.clone(),
        })
    }

    /// Evaluates the filter against a single record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a subset cannot be materialized.
    pub fn matches(
        &self,
        record: &Record,
        resolver: &dyn SubsetResolver,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Always => Ok(true),
            Self::Never => Ok(false),
            Self::And(children) => {
                for child in children {
                    if !child.matches(record, resolver)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.matches(record, resolver)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(child) => Ok(!child.matches(record, resolver)?),
            Self::Condition(condition) => Ok(condition.evaluate(record)),
            Self::KeyIn(subset) => {
                if let Some(keys) = subset.local_keys() {
                    return Ok(keys.contains(&record.key));
                }
                Ok(resolver.resolve_subset(subset)?.contains(&record.key))
            }
        }
    }
}

// ============================================================================
// SECTION: Subsets and Queries
// ============================================================================

/// Queryable subset of a collection, materialized to record keys on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Subset {
    /// Records produced by a query.
    Query(Query),
    /// Explicit key set.
    Keys(BTreeSet<RecordKey>),
    /// Set union of subsets.
    Union(Vec<Self>),
}

impl Subset {
    /// Creates an explicit key set.
    #[must_use]
    pub fn keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = RecordKey>,
    {
        Self::Keys(keys.into_iter().collect())
    }

    /// Unions subsets into a single subset, flattening nested unions.
    #[must_use]
    pub fn union<I>(subsets: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut members = Vec::new();
        for subset in subsets {
            match subset {
                Self::Union(nested) => members.extend(nested),
                other => members.push(other),
            }
        }
        match members.len() {
            0 => Self::Keys(BTreeSet::new()),
            1 => members.pop().unwrap_or_else(|| Self::Keys(BTreeSet::new())),
            _ => Self::Union(members),
        }
    }

    /// Returns the key set when it is known without running a query.
    #[must_use]
    pub fn local_keys(&self) -> Option<BTreeSet<RecordKey>> {
        match self {
            Self::Keys(keys) => Some(keys.clone()),
            Self::Query(_) => None,
            Self::Union(members) => {
                let mut keys = BTreeSet::new();
                for member in members {
                    keys.extend(member.local_keys()?);
                }
                Some(keys)
            }
        }
    }
}

/// Lazily evaluated query over one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Resource type the query ranges over.
    resource: ResourceType,
    /// Filters combined with AND.
    filters: Vec<Filter>,
}

impl Query {
    /// Creates an unfiltered query.
    #[must_use]
    pub const fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            filters: Vec::new(),
        }
    }

    /// Narrows the query with an additional filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Returns the queried resource type.
    #[must_use]
    pub const fn resource(&self) -> &ResourceType {
        &self.resource
    }

    /// Returns the filters applied so far.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns the conjunction of all filters.
    #[must_use]
    pub fn predicate(&self) -> Filter {
        Filter::and(self.filters.iter().cloned())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]
mod tests {
    use serde_json::json;

    use std::cell::Cell;
    use std::collections::BTreeSet;

    use super::CompareOp;
    use super::Condition;
    use super::FieldPath;
    use super::Filter;
    use super::Query;
    use super::Record;
    use super::Subset;
    use crate::core::identifiers::RecordKey;
    use crate::core::identifiers::ResourceType;
    use crate::interfaces::StoreError;
    use crate::interfaces::SubsetResolver;

    /// Resolver answering every query with keys 1 and 2, counting calls.
    #[derive(Default)]
    struct CountingResolver {
        calls: Cell<usize>,
    }

    impl SubsetResolver for CountingResolver {
        fn resolve_subset(&self, _subset: &Subset) -> Result<BTreeSet<RecordKey>, StoreError> {
            self.calls.set(self.calls.get() + 1);
            Ok([RecordKey::from(1_u64), RecordKey::from(2_u64)].into_iter().collect())
        }
    }

    fn field(name: &str) -> FieldPath {
        FieldPath::field(name).expect("field path")
    }

    #[test]
    fn field_path_accepts_both_separators() {
        let dotted = FieldPath::parse("operator.external_company").unwrap();
        let lookup = FieldPath::parse("operator__external_company").unwrap();
        assert_eq!(dotted, lookup);
        assert_eq!(dotted.first(), "operator");
        assert_eq!(dotted.rest().unwrap().to_string(), "external_company");
        assert!(FieldPath::parse("operator..company").is_none());
        assert!(FieldPath::parse("").is_none());
    }

    #[test]
    fn boolean_identities_simplify() {
        let open = Filter::equals(field("status"), "open");
        assert_eq!(Filter::and([Filter::Always, open.clone()]), open);
        assert_eq!(Filter::and([open.clone(), Filter::Never]), Filter::Never);
        assert_eq!(Filter::or([Filter::Never, open.clone()]), open);
        assert_eq!(Filter::or([open, Filter::Always]), Filter::Always);
        assert_eq!(Filter::and(Vec::new()), Filter::Always);
        assert_eq!(Filter::or(Vec::new()), Filter::Never);
    }

    #[test]
    fn compare_treats_mismatched_kinds_as_failing() {
        let record = Record::new(1_u64).with_field("total", 40);
        assert!(Condition::Compare(field("total"), CompareOp::Lt, json!(100)).evaluate(&record));
        assert!(!Condition::Compare(field("total"), CompareOp::Lt, json!("100")).evaluate(&record));

        let missing = Record::new(2_u64);
        assert!(Condition::Compare(field("total"), CompareOp::Ne, json!(1)).evaluate(&missing));
        assert!(!Condition::Compare(field("total"), CompareOp::Ge, json!(1)).evaluate(&missing));
    }

    #[test]
    fn union_flattens_nested_unions() {
        let one = Subset::keys([RecordKey::from(1_u64)]);
        let two = Subset::keys([RecordKey::from(2_u64)]);
        assert_eq!(Subset::union([one.clone()]), one);

        let nested = Subset::union([Subset::union([one.clone(), two.clone()]), one.clone()]);
        assert_eq!(nested, Subset::Union(vec![one.clone(), two, one]));
        assert_eq!(nested.local_keys().map(|keys| keys.len()), Some(2));
        assert_eq!(Subset::union(Vec::new()), Subset::keys(Vec::new()));
    }

    #[test]
    fn materialized_filter_resolves_each_subset_once() {
        let resolver = CountingResolver::default();
        let query = Query::new(ResourceType::new("shop", "order"));
        let filter = Filter::and([
            Filter::key_in(Subset::Query(query)),
            Filter::negate(Filter::key_eq(RecordKey::from(2_u64))),
        ]);
        let materialized = filter.materialize(&resolver).unwrap();
        assert_eq!(resolver.calls.get(), 1);

        let hits: Vec<u64> = (1_u64..=4)
            .filter(|key| materialized.matches(&Record::new(*key), &resolver).unwrap())
            .collect();
        assert_eq!(hits, vec![1]);
        assert_eq!(resolver.calls.get(), 1);
    }
}
