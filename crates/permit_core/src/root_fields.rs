//! Root-field visibility and its consistency rules.
//!
//! The explicit query/subscription sets are only meaningful while
//! customization is enabled, and `select_aggregate` is only available
//! while aggregation permission is on. The reducer in `state` routes
//! every toggle through the functions here so the sets can never be
//! observed mid-repair.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A top-level query/subscription entry point whose visibility can be
/// restricted per role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RootField {
    Select,
    SelectByPk,
    SelectAggregate,
}

impl RootField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootField::Select => "select",
            RootField::SelectByPk => "select_by_pk",
            RootField::SelectAggregate => "select_aggregate",
        }
    }
}

/// Which of the two explicit root-field sets an action targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Subscription,
}

/// The fields an operator can currently pick from: `select` and
/// `select_by_pk` always, `select_aggregate` only with aggregation
/// permission.
pub fn available_root_fields(allow_aggregations: bool) -> BTreeSet<RootField> {
    let mut fields = BTreeSet::from([RootField::Select, RootField::SelectByPk]);
    if allow_aggregations {
        fields.insert(RootField::SelectAggregate);
    }
    fields
}

/// Whether the checkbox for a field is interactive at all.
pub fn is_selectable(field: RootField, allow_aggregations: bool) -> bool {
    field != RootField::SelectAggregate || allow_aggregations
}

/// The checked state a stored set reports for a field. A stale
/// `select_aggregate` entry is masked (reported unchecked) while
/// aggregation permission is off; it is not surfaced again unless the
/// operator re-checks it after re-enabling aggregations.
pub fn is_checked(set: &BTreeSet<RootField>, field: RootField, allow_aggregations: bool) -> bool {
    if !is_selectable(field, allow_aggregations) {
        return false;
    }
    set.contains(&field)
}

/// The set as the outside world sees it, with unavailable fields masked.
pub fn effective_root_fields(
    set: &BTreeSet<RootField>,
    allow_aggregations: bool,
) -> BTreeSet<RootField> {
    set.iter()
        .copied()
        .filter(|field| is_selectable(*field, allow_aggregations))
        .collect()
}

/// Select-all toggle: a set that already equals the available list is
/// cleared; anything else becomes exactly the available list. Never adds
/// `select_aggregate` while aggregations are off.
pub fn toggle_select_all(set: &mut BTreeSet<RootField>, allow_aggregations: bool) {
    let available = available_root_fields(allow_aggregations);
    if *set == available {
        set.clear();
    } else {
        *set = available;
    }
}
