//! Metadata filters.
//!
//! A [`SearchFilter`] is a tree of field conditions joined by conjunctions.
//! Backing indexes translate it into their native filter expression; the
//! fallback cache and the memory index evaluate it in-process with
//! [`SearchFilter::matches`].
//!
//! [`FilterBuilder`] turns a loosely-typed request (field name to JSON value)
//! into a filter tree with a fixed field-to-operator mapping.

use crate::types::{Metadata, MetadataValue};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// A structured filter request, as received from the query layer.
pub type FilterRequest = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Filter tree
// ============================================================================

/// A condition tree over document metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// Field equals the value.
    Equals {
        /// Metadata field.
        field: String,
        /// Expected value.
        value: MetadataValue,
    },

    /// Numeric field within inclusive bounds; a missing bound is open.
    Range {
        /// Metadata field.
        field: String,
        /// Lower bound (inclusive).
        min: Option<f64>,
        /// Upper bound (inclusive).
        max: Option<f64>,
    },

    /// Field equals one of the values.
    In {
        /// Metadata field.
        field: String,
        /// Allowed values.
        values: Vec<MetadataValue>,
    },

    /// Boolean field has the given value.
    Boolean {
        /// Metadata field.
        field: String,
        /// Expected flag.
        value: bool,
    },

    /// Every child must match. An empty conjunction matches everything.
    AllOf(Vec<SearchFilter>),
}

impl SearchFilter {
    /// Equality condition.
    pub fn equals(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Range condition with optional bounds.
    pub fn range(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range {
            field: field.into(),
            min,
            max,
        }
    }

    /// Lower-bounded range.
    pub fn at_least(field: impl Into<String>, min: f64) -> Self {
        Self::range(field, Some(min), None)
    }

    /// Upper-bounded range.
    pub fn at_most(field: impl Into<String>, max: f64) -> Self {
        Self::range(field, None, Some(max))
    }

    /// Set-membership condition.
    pub fn one_of(field: impl Into<String>, values: Vec<MetadataValue>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    /// Boolean flag condition.
    pub fn flag(field: impl Into<String>, value: bool) -> Self {
        Self::Boolean {
            field: field.into(),
            value,
        }
    }

    /// Combine conditions into one filter.
    ///
    /// Nested conjunctions are flattened. Zero conditions yield `None`; a
    /// single condition is returned unwrapped.
    pub fn all_of(conditions: impl IntoIterator<Item = SearchFilter>) -> Option<Self> {
        let mut flat = Vec::new();
        for condition in conditions {
            match condition {
                Self::AllOf(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Self::AllOf(flat)),
        }
    }

    /// Whether this filter places no constraint at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::AllOf(children) => children.iter().all(Self::is_empty),
            _ => false,
        }
    }

    /// Leaf conditions in evaluation order.
    pub fn conditions(&self) -> Vec<&SearchFilter> {
        match self {
            Self::AllOf(children) => children.iter().flat_map(Self::conditions).collect(),
            leaf => vec![leaf],
        }
    }

    /// Evaluate against document metadata. Missing fields never match.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Equals { field, value } => metadata
                .get(field)
                .is_some_and(|actual| actual.loosely_equals(value)),
            Self::Range { field, min, max } => {
                let Some(actual) = metadata.get(field).and_then(MetadataValue::as_f64) else {
                    return false;
                };
                min.is_none_or(|lo| actual >= lo) && max.is_none_or(|hi| actual <= hi)
            }
            Self::In { field, values } => metadata
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| actual.loosely_equals(v))),
            Self::Boolean { field, value } => metadata
                .get(field)
                .and_then(MetadataValue::as_bool)
                .is_some_and(|actual| actual == *value),
            Self::AllOf(children) => children.iter().all(|c| c.matches(metadata)),
        }
    }
}

/// Evaluate an optional filter; `None` matches everything.
pub fn matches_filter(filter: Option<&SearchFilter>, metadata: &Metadata) -> bool {
    filter.is_none_or(|f| f.matches(metadata))
}

// ============================================================================
// Filter builder
// ============================================================================

/// Translates filter requests into [`SearchFilter`] trees.
///
/// Field mapping:
///
/// | Request key | Condition |
/// |-------------|-----------|
/// | exact field (e.g. `city`) | `equals` |
/// | `min_x` / `max_x` | `range` on `x` |
/// | lower-bound alias (e.g. `rooms`) | `range` with `min` |
/// | boolean flag (e.g. `has_garden`) | `boolean`, only when `true`/`false` |
/// | allow-list (e.g. `energy_ratings`) | `in` (or `equals` for one value) |
///
/// Unknown keys are ignored. Values of the wrong shape are skipped with a
/// warning rather than failing the whole request.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    exact_fields: BTreeSet<String>,
    boolean_fields: BTreeSet<String>,
    lower_bounds: BTreeMap<String, String>,
    upper_bounds: BTreeMap<String, String>,
    allow_lists: BTreeMap<String, String>,
}

impl FilterBuilder {
    /// An empty builder that only understands `min_x`/`max_x` keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// The field mapping used for property listings.
    pub fn listings() -> Self {
        Self::new()
            .with_exact_fields([
                "city",
                "country",
                "region",
                "district",
                "neighborhood",
                "property_type",
                "listing_type",
                "currency",
            ])
            .with_boolean_fields([
                "has_parking",
                "has_garden",
                "has_pool",
                "has_elevator",
                "has_garage",
                "has_bike_room",
                "has_balcony",
                "is_furnished",
                "pets_allowed",
            ])
            .with_lower_bound("rooms", "rooms")
            .with_lower_bound("bathrooms", "bathrooms")
            .with_lower_bound("year_built_min", "year_built")
            .with_upper_bound("year_built_max", "year_built")
            .with_allow_list("energy_ratings", "energy_cert")
            .with_allow_list("property_types", "property_type")
    }

    /// Fields translated to `equals`.
    pub fn with_exact_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Fields translated to `boolean`.
    pub fn with_boolean_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boolean_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// A request key that sets a minimum on `field`.
    pub fn with_lower_bound(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.lower_bounds.insert(key.into(), field.into());
        self
    }

    /// A request key that sets a maximum on `field`.
    pub fn with_upper_bound(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.upper_bounds.insert(key.into(), field.into());
        self
    }

    /// A request key holding a list of allowed values for `field`.
    pub fn with_allow_list(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.allow_lists.insert(key.into(), field.into());
        self
    }

    /// Build a filter from a request.
    ///
    /// Returns `None` when the request produces no conditions.
    pub fn build(&self, request: &FilterRequest) -> Option<SearchFilter> {
        let mut conditions = Vec::new();

        for (key, value) in request {
            if value.is_null() {
                continue;
            }
            conditions.extend(self.condition_for(key, value));
        }

        let filter = SearchFilter::all_of(conditions);
        debug!("Built filter from {} request keys: {filter:?}", request.len());
        filter
    }

    fn condition_for(&self, key: &str, value: &serde_json::Value) -> Option<SearchFilter> {
        if self.exact_fields.contains(key) {
            return match MetadataValue::from_json(value) {
                Some(v) if !v.is_null() => Some(SearchFilter::equals(key, v)),
                _ => {
                    warn!("Ignoring non-primitive value for filter '{key}'");
                    None
                }
            };
        }

        if self.boolean_fields.contains(key) {
            return match value.as_bool() {
                Some(flag) => Some(SearchFilter::flag(key, flag)),
                None => {
                    warn!("Ignoring non-boolean value for filter '{key}'");
                    None
                }
            };
        }

        if let Some(field) = self.allow_lists.get(key) {
            return allow_list_condition(key, field, value);
        }

        if let Some(field) = self.lower_bounds.get(key) {
            return numeric(key, value).map(|n| SearchFilter::at_least(field.as_str(), n));
        }

        if let Some(field) = self.upper_bounds.get(key) {
            return numeric(key, value).map(|n| SearchFilter::at_most(field.as_str(), n));
        }

        if let Some(field) = key.strip_prefix("min_").filter(|f| !f.is_empty()) {
            return numeric(key, value).map(|n| SearchFilter::at_least(field, n));
        }

        if let Some(field) = key.strip_prefix("max_").filter(|f| !f.is_empty()) {
            return numeric(key, value).map(|n| SearchFilter::at_most(field, n));
        }

        debug!("Ignoring unknown filter key '{key}'");
        None
    }
}

fn numeric(key: &str, value: &serde_json::Value) -> Option<f64> {
    let parsed = MetadataValue::from_json(value).and_then(|v| v.as_f64());
    if parsed.is_none() {
        warn!("Ignoring non-numeric value for filter '{key}'");
    }
    parsed
}

fn allow_list_condition(key: &str, field: &str, value: &serde_json::Value) -> Option<SearchFilter> {
    let mut values: Vec<MetadataValue> = match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(MetadataValue::from_json)
            .filter(|v| !v.is_null())
            .collect(),
        scalar => MetadataValue::from_json(scalar).into_iter().collect(),
    };

    match values.len() {
        0 => {
            debug!("Empty allow-list for filter '{key}'");
            None
        }
        1 => values.pop().map(|v| SearchFilter::equals(field, v)),
        _ => Some(SearchFilter::one_of(field, values)),
    }
}

// ============================================================================
// Tests
// ============================================================================
