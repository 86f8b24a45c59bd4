//! The per-role, per-table, per-action permission state and the reducer
//! that is its only mutation path.
//!
//! Every operator input maps to one [`EditAction`]; [`PermissionState::apply`]
//! lands the full consequence set of that action in a single synchronous
//! call, so a caller can never observe a toggle with its dependent fields
//! half-repaired. Rejected actions leave the state untouched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash;
use crate::context::TableContext;
use crate::error::PolicyError;
use crate::filter::RuleGroup;
use crate::presets::PresetSet;
use crate::root_fields::{
    available_root_fields, is_selectable, toggle_select_all, OperationKind, RootField,
};

/// The database action a permission applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    Select,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Select => "select",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Row-check mode: unrestricted, or a custom predicate tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowCheck {
    None,
    Custom,
}

/// One discrete operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    SetRowCheck(RowCheck),
    SetLimit(Option<u32>),
    SetAllowAggregations(bool),
    SetRootFieldCustomization(bool),
    ToggleSelectAll(OperationKind),
    SetRootField {
        operation: OperationKind,
        field: RootField,
        checked: bool,
    },
    AddPreset,
    RemovePreset(usize),
    SetPresetColumn { index: usize, column: String },
    SetPresetValue { index: usize, value: Option<String> },
    ToggleColumn(String),
    SetColumns(Vec<String>),
    SetBackendOnly(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionState {
    action: Action,
    row_check: RowCheck,
    filter: RuleGroup,
    cached_filter: Option<RuleGroup>,
    limit: Option<u32>,
    allow_aggregations: bool,
    enable_root_field_customization: bool,
    query_root_fields: BTreeSet<RootField>,
    subscription_root_fields: BTreeSet<RootField>,
    presets: PresetSet,
    columns: BTreeSet<String>,
    backend_only: bool,
    computed_fields: Vec<String>,
    /// Canonical hash of the compiled payload as of open/save, for dirty
    /// detection.
    baseline_hash: Option<String>,
}

impl PermissionState {
    /// Fresh state for a role/action pair with no existing policy.
    pub fn new(action: Action) -> Self {
        let mut state = PermissionState {
            action,
            row_check: RowCheck::None,
            filter: RuleGroup::empty(),
            cached_filter: None,
            limit: None,
            allow_aggregations: false,
            enable_root_field_customization: false,
            query_root_fields: BTreeSet::new(),
            subscription_root_fields: BTreeSet::new(),
            presets: PresetSet::new(),
            columns: BTreeSet::new(),
            backend_only: false,
            computed_fields: Vec::new(),
            baseline_hash: None,
        };
        state.mark_saved();
        state
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn row_check(&self) -> RowCheck {
        self.row_check
    }

    /// The predicate the outside world sees: the live tree in custom
    /// mode, the always-true sentinel otherwise.
    pub fn effective_filter(&self) -> RuleGroup {
        match self.row_check {
            RowCheck::None => RuleGroup::empty(),
            RowCheck::Custom => self.filter.clone(),
        }
    }

    /// The live tree, editable only while the row check is custom.
    pub fn filter_mut(&mut self) -> Option<&mut RuleGroup> {
        match self.row_check {
            RowCheck::Custom => Some(&mut self.filter),
            RowCheck::None => None,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn allow_aggregations(&self) -> bool {
        self.allow_aggregations
    }

    pub fn root_field_customization(&self) -> bool {
        self.enable_root_field_customization
    }

    pub fn root_fields(&self, operation: OperationKind) -> &BTreeSet<RootField> {
        match operation {
            OperationKind::Query => &self.query_root_fields,
            OperationKind::Subscription => &self.subscription_root_fields,
        }
    }

    pub fn presets(&self) -> &PresetSet {
        &self.presets
    }

    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    pub fn backend_only(&self) -> bool {
        self.backend_only
    }

    pub fn computed_fields(&self) -> &[String] {
        &self.computed_fields
    }

    /// Applies one operator input and its full consequence set. On error
    /// nothing has changed.
    pub fn apply(&mut self, action: EditAction, ctx: &TableContext) -> Result<(), PolicyError> {
        match action {
            EditAction::SetRowCheck(target) => {
                self.set_row_check(target);
                Ok(())
            }
            EditAction::SetLimit(limit) => {
                self.select_only("row limit")?;
                self.limit = limit;
                Ok(())
            }
            EditAction::SetAllowAggregations(allowed) => {
                self.select_only("aggregation permission")?;
                self.allow_aggregations = allowed;
                if !allowed {
                    // A role must never keep aggregate root fields without
                    // aggregation permission, not even transiently.
                    self.query_root_fields.remove(&RootField::SelectAggregate);
                    self.subscription_root_fields
                        .remove(&RootField::SelectAggregate);
                }
                Ok(())
            }
            EditAction::SetRootFieldCustomization(enabled) => {
                self.select_only("root-field customization")?;
                self.enable_root_field_customization = enabled;
                if enabled {
                    // Seed with exactly what was implicitly allowed the
                    // instant before, so the toggle is a no-op on
                    // effective permissions.
                    let seed = available_root_fields(self.allow_aggregations);
                    self.query_root_fields = seed.clone();
                    self.subscription_root_fields = seed;
                } else {
                    self.query_root_fields.clear();
                    self.subscription_root_fields.clear();
                }
                Ok(())
            }
            EditAction::ToggleSelectAll(operation) => {
                self.select_only("root-field select all")?;
                let allow = self.allow_aggregations;
                toggle_select_all(self.root_fields_mut(operation), allow);
                Ok(())
            }
            EditAction::SetRootField {
                operation,
                field,
                checked,
            } => {
                self.select_only("root-field selection")?;
                if !is_selectable(field, self.allow_aggregations) {
                    return Err(PolicyError::AggregationsDisabled);
                }
                let set = self.root_fields_mut(operation);
                if checked {
                    set.insert(field);
                } else {
                    set.remove(&field);
                }
                Ok(())
            }
            EditAction::AddPreset => {
                self.preset_actions_only()?;
                self.presets.add(ctx.total_columns())
            }
            EditAction::RemovePreset(index) => {
                self.preset_actions_only()?;
                self.presets.remove(index).map(|_| ())
            }
            EditAction::SetPresetColumn { index, column } => {
                self.preset_actions_only()?;
                if !column.is_empty() && !ctx.columns.is_empty() && !ctx.has_column(&column) {
                    return Err(PolicyError::UnknownColumn(column));
                }
                self.presets.set_column(index, &column)
            }
            EditAction::SetPresetValue { index, value } => {
                self.preset_actions_only()?;
                self.presets.set_value(index, value)
            }
            EditAction::ToggleColumn(column) => {
                self.column_actions_only()?;
                if !ctx.columns.is_empty() && !ctx.has_column(&column) {
                    return Err(PolicyError::UnknownColumn(column));
                }
                if !self.columns.remove(&column) {
                    self.columns.insert(column);
                }
                Ok(())
            }
            EditAction::SetColumns(columns) => {
                self.column_actions_only()?;
                if !ctx.columns.is_empty() {
                    if let Some(unknown) = columns.iter().find(|c| !ctx.has_column(c)) {
                        return Err(PolicyError::UnknownColumn(unknown.clone()));
                    }
                }
                self.columns = columns.into_iter().collect();
                Ok(())
            }
            EditAction::SetBackendOnly(enabled) => {
                if self.action == Action::Select {
                    return Err(PolicyError::NotApplicable {
                        action: self.action,
                        operation: "backend only",
                    });
                }
                self.backend_only = enabled;
                Ok(())
            }
        }
    }

    /// Row-check state machine. Leaving custom mode stashes the live tree
    /// so an accidental toggle never loses work; re-entering restores it,
    /// falling back to a single blank rule row on first entry.
    fn set_row_check(&mut self, target: RowCheck) {
        match (self.row_check, target) {
            (RowCheck::None, RowCheck::Custom) => {
                self.filter = self
                    .cached_filter
                    .take()
                    .unwrap_or_else(RuleGroup::default_editable);
                self.row_check = RowCheck::Custom;
            }
            (RowCheck::Custom, RowCheck::None) => {
                self.cached_filter = Some(std::mem::take(&mut self.filter));
                self.row_check = RowCheck::None;
            }
            _ => {}
        }
    }

    fn root_fields_mut(&mut self, operation: OperationKind) -> &mut BTreeSet<RootField> {
        match operation {
            OperationKind::Query => &mut self.query_root_fields,
            OperationKind::Subscription => &mut self.subscription_root_fields,
        }
    }

    fn select_only(&self, operation: &'static str) -> Result<(), PolicyError> {
        if self.action != Action::Select {
            return Err(PolicyError::NotApplicable {
                action: self.action,
                operation,
            });
        }
        Ok(())
    }

    fn preset_actions_only(&self) -> Result<(), PolicyError> {
        if !matches!(self.action, Action::Insert | Action::Update) {
            return Err(PolicyError::NotApplicable {
                action: self.action,
                operation: "column presets",
            });
        }
        Ok(())
    }

    fn column_actions_only(&self) -> Result<(), PolicyError> {
        if self.action == Action::Delete {
            return Err(PolicyError::NotApplicable {
                action: self.action,
                operation: "column permissions",
            });
        }
        Ok(())
    }

    /// Save-boundary validation against the table's known columns. An
    /// empty column list skips existence checks (metadata may be
    /// unavailable); structural checks always run.
    pub fn validate(&self, ctx: &TableContext) -> Result<(), PolicyError> {
        if self.row_check == RowCheck::Custom {
            self.filter.well_formedness()?;
            if !ctx.columns.is_empty() {
                validate_filter_columns(&self.filter, ctx)?;
            }
        }
        if !ctx.columns.is_empty() {
            if self.presets.len() > ctx.total_columns() {
                return Err(PolicyError::PresetLimitReached {
                    total_columns: ctx.total_columns(),
                });
            }
            for row in self.presets.rows() {
                if !row.column.is_empty() && !ctx.has_column(&row.column) {
                    return Err(PolicyError::UnknownColumn(row.column.clone()));
                }
            }
            for column in &self.columns {
                if !ctx.has_column(column) {
                    return Err(PolicyError::UnknownColumn(column.clone()));
                }
            }
        }
        Ok(())
    }

    /// Whether the state differs from its as-opened (or last-saved)
    /// compiled form. Exposed to the surrounding drawer/dialog as its
    /// close guard.
    pub fn is_dirty(&self) -> bool {
        let Some(baseline) = &self.baseline_hash else {
            return true;
        };
        match canonical_hash(&self.compile()) {
            Ok(current) => current != *baseline,
            Err(_) => true,
        }
    }

    pub fn mark_saved(&mut self) {
        self.baseline_hash = canonical_hash(&self.compile()).ok();
    }

    pub(crate) fn parts_mut(&mut self) -> StateParts<'_> {
        StateParts {
            row_check: &mut self.row_check,
            filter: &mut self.filter,
            limit: &mut self.limit,
            allow_aggregations: &mut self.allow_aggregations,
            enable_root_field_customization: &mut self.enable_root_field_customization,
            query_root_fields: &mut self.query_root_fields,
            subscription_root_fields: &mut self.subscription_root_fields,
            presets: &mut self.presets,
            columns: &mut self.columns,
            backend_only: &mut self.backend_only,
            computed_fields: &mut self.computed_fields,
        }
    }
}

/// Mutable view used by the payload loader while assembling a state from
/// an external document.
pub(crate) struct StateParts<'a> {
    pub row_check: &'a mut RowCheck,
    pub filter: &'a mut RuleGroup,
    pub limit: &'a mut Option<u32>,
    pub allow_aggregations: &'a mut bool,
    pub enable_root_field_customization: &'a mut bool,
    pub query_root_fields: &'a mut BTreeSet<RootField>,
    pub subscription_root_fields: &'a mut BTreeSet<RootField>,
    pub presets: &'a mut PresetSet,
    pub columns: &'a mut BTreeSet<String>,
    pub backend_only: &'a mut bool,
    pub computed_fields: &'a mut Vec<String>,
}

fn validate_filter_columns(group: &RuleGroup, ctx: &TableContext) -> Result<(), PolicyError> {
    for rule in &group.rules {
        // Relationship paths reach other tables; only plain columns can
        // be checked against this table's list.
        if !rule.column.contains('.') && !ctx.has_column(&rule.column) {
            return Err(PolicyError::UnknownColumn(rule.column.clone()));
        }
    }
    for sub in &group.groups {
        validate_filter_columns(sub, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparison, Rule};
    use serde_json::json;

    fn ctx() -> TableContext {
        TableContext::new(vec![
            "id".to_string(),
            "title".to_string(),
            "owner_id".to_string(),
        ])
    }

    fn select_state() -> PermissionState {
        PermissionState::new(Action::Select)
    }

    #[test]
    fn row_check_toggle_preserves_the_custom_tree() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRowCheck(RowCheck::Custom), &ctx())
            .unwrap();
        {
            let filter = state.filter_mut().unwrap();
            filter.rules[0] = Rule::new("title", Comparison::Eq, json!("test"));
        }
        let before = state.effective_filter();

        state
            .apply(EditAction::SetRowCheck(RowCheck::None), &ctx())
            .unwrap();
        assert!(state.effective_filter().is_empty());
        assert!(state.filter_mut().is_none());

        state
            .apply(EditAction::SetRowCheck(RowCheck::Custom), &ctx())
            .unwrap();
        assert_eq!(state.effective_filter(), before);
    }

    #[test]
    fn entering_custom_mode_starts_with_one_editable_rule() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRowCheck(RowCheck::Custom), &ctx())
            .unwrap();
        let filter = state.effective_filter();
        assert_eq!(filter.rules.len(), 1);
        assert_eq!(filter.rules[0].column, "");
        assert_eq!(filter.rules[0].operator, Comparison::Eq);
    }

    #[test]
    fn disabling_aggregations_purges_aggregate_root_fields() {
        let mut state = select_state();
        state
            .apply(EditAction::SetAllowAggregations(true), &ctx())
            .unwrap();
        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        assert!(state
            .root_fields(OperationKind::Query)
            .contains(&RootField::SelectAggregate));

        state
            .apply(EditAction::SetAllowAggregations(false), &ctx())
            .unwrap();
        for operation in [OperationKind::Query, OperationKind::Subscription] {
            assert!(!state
                .root_fields(operation)
                .contains(&RootField::SelectAggregate));
        }
    }

    #[test]
    fn customization_seed_matches_what_was_implicitly_allowed() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        let expected = BTreeSet::from([RootField::Select, RootField::SelectByPk]);
        assert_eq!(state.root_fields(OperationKind::Query), &expected);
        assert_eq!(state.root_fields(OperationKind::Subscription), &expected);
    }

    #[test]
    fn customization_seed_is_idempotent_across_off_on() {
        let mut state = select_state();
        state
            .apply(EditAction::SetAllowAggregations(true), &ctx())
            .unwrap();
        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        let first = state.root_fields(OperationKind::Query).clone();

        state
            .apply(EditAction::SetRootFieldCustomization(false), &ctx())
            .unwrap();
        assert!(state.root_fields(OperationKind::Query).is_empty());

        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        assert_eq!(state.root_fields(OperationKind::Query), &first);
    }

    #[test]
    fn select_all_is_idempotent_and_inverts_on_the_third_toggle() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        state
            .apply(
                EditAction::SetRootField {
                    operation: OperationKind::Query,
                    field: RootField::SelectByPk,
                    checked: false,
                },
                &ctx(),
            )
            .unwrap();

        state
            .apply(EditAction::ToggleSelectAll(OperationKind::Query), &ctx())
            .unwrap();
        let all = state.root_fields(OperationKind::Query).clone();
        assert_eq!(all, available_root_fields(false));

        // Second application: already-full set clears.
        state
            .apply(EditAction::ToggleSelectAll(OperationKind::Query), &ctx())
            .unwrap();
        assert!(state.root_fields(OperationKind::Query).is_empty());

        // Third: back to the full list.
        state
            .apply(EditAction::ToggleSelectAll(OperationKind::Query), &ctx())
            .unwrap();
        assert_eq!(state.root_fields(OperationKind::Query), &all);
    }

    #[test]
    fn aggregate_checkbox_is_rejected_while_aggregations_are_off() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRootFieldCustomization(true), &ctx())
            .unwrap();
        let err = state
            .apply(
                EditAction::SetRootField {
                    operation: OperationKind::Query,
                    field: RootField::SelectAggregate,
                    checked: true,
                },
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(err, PolicyError::AggregationsDisabled);
    }

    #[test]
    fn select_specific_operations_reject_other_actions() {
        let mut state = PermissionState::new(Action::Insert);
        let err = state
            .apply(EditAction::SetLimit(Some(10)), &ctx())
            .unwrap_err();
        assert_eq!(
            err,
            PolicyError::NotApplicable {
                action: Action::Insert,
                operation: "row limit",
            }
        );
        assert!(state
            .apply(EditAction::SetAllowAggregations(true), &ctx())
            .is_err());
        // And the other way around for presets and backend-only.
        let mut select = select_state();
        assert!(select.apply(EditAction::AddPreset, &ctx()).is_err());
        assert!(select
            .apply(EditAction::SetBackendOnly(true), &ctx())
            .is_err());
    }

    #[test]
    fn preset_mutations_respect_known_columns() {
        let mut state = PermissionState::new(Action::Insert);
        state.apply(EditAction::AddPreset, &ctx()).unwrap();
        let err = state
            .apply(
                EditAction::SetPresetColumn {
                    index: 0,
                    column: "no_such_column".to_string(),
                },
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            PolicyError::UnknownColumn("no_such_column".to_string())
        );
        state
            .apply(
                EditAction::SetPresetColumn {
                    index: 0,
                    column: "owner_id".to_string(),
                },
                &ctx(),
            )
            .unwrap();
    }

    #[test]
    fn preset_count_is_bounded_by_the_table() {
        let three = ctx();
        let mut state = PermissionState::new(Action::Update);
        for i in 0..3 {
            state.apply(EditAction::AddPreset, &three).unwrap();
            state
                .apply(
                    EditAction::SetPresetColumn {
                        index: i,
                        column: three.columns[i].clone(),
                    },
                    &three,
                )
                .unwrap();
        }
        assert_eq!(
            state.apply(EditAction::AddPreset, &three),
            Err(PolicyError::PresetLimitReached { total_columns: 3 })
        );
    }

    #[test]
    fn validate_flags_incomplete_rules_and_unknown_columns() {
        let mut state = select_state();
        state
            .apply(EditAction::SetRowCheck(RowCheck::Custom), &ctx())
            .unwrap();
        assert_eq!(state.validate(&ctx()), Err(PolicyError::EmptyRuleColumn));

        state.filter_mut().unwrap().rules[0] = Rule::new("ghost", Comparison::Eq, json!("x"));
        assert_eq!(
            state.validate(&ctx()),
            Err(PolicyError::UnknownColumn("ghost".to_string()))
        );

        state.filter_mut().unwrap().rules[0] = Rule::new("title", Comparison::Eq, json!("x"));
        assert_eq!(state.validate(&ctx()), Ok(()));

        // Relationship paths are not checked against this table.
        state.filter_mut().unwrap().rules[0] =
            Rule::new("author.name", Comparison::Eq, json!("x"));
        assert_eq!(state.validate(&ctx()), Ok(()));

        // Without metadata, existence checks are skipped entirely.
        assert_eq!(state.validate(&TableContext::default()), Ok(()));
    }

    #[test]
    fn dirty_flag_tracks_the_compiled_payload() {
        let mut state = select_state();
        assert!(!state.is_dirty());

        state
            .apply(EditAction::SetLimit(Some(25)), &ctx())
            .unwrap();
        assert!(state.is_dirty());

        state.apply(EditAction::SetLimit(None), &ctx()).unwrap();
        assert!(!state.is_dirty());

        state.apply(EditAction::SetLimit(Some(5)), &ctx()).unwrap();
        state.mark_saved();
        assert!(!state.is_dirty());
    }
}
