//! The declarative permission document exchanged with the backend, and
//! the load/compile bridge between it and [`PermissionState`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::{from_external, to_external};
use crate::error::DeserializeError;
use crate::filter::{Connective, RuleGroup};
use crate::root_fields::{effective_root_fields, OperationKind, RootField};
use crate::state::{Action, PermissionState, RowCheck};

/// One action's permission entry as the backend stores it. Insert
/// permissions carry their row predicate in `check`; every other action
/// uses `filter`. `null`/absent root-field lists mean "not customized".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PermissionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_aggregations: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_root_fields: Option<Vec<RootField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_root_fields: Option<Vec<RootField>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub backend_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_fields: Option<Vec<String>>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl PermissionState {
    /// Builds editor state from a stored permission. The row-check mode
    /// starts as `None` exactly when the loaded predicate is the
    /// empty-true sentinel; root-field customization is on exactly when
    /// either explicit list is present and non-empty.
    pub fn load(action: Action, payload: &PermissionPayload) -> Result<Self, DeserializeError> {
        let source = match action {
            Action::Insert => payload.check.as_ref(),
            _ => payload.filter.as_ref(),
        };
        let tree = match source {
            Some(value) => from_external(value)?,
            None => RuleGroup::empty(),
        };

        let mut state = PermissionState::new(action);
        {
            let parts = state.parts_mut();
            if tree.is_empty() && tree.connective == Connective::And {
                *parts.row_check = RowCheck::None;
            } else {
                *parts.row_check = RowCheck::Custom;
                *parts.filter = tree;
            }

            if action == Action::Select {
                *parts.limit = payload.limit;
                *parts.allow_aggregations = payload.allow_aggregations;
                let query = payload.query_root_fields.clone().unwrap_or_default();
                let subscription = payload.subscription_root_fields.clone().unwrap_or_default();
                *parts.enable_root_field_customization =
                    !query.is_empty() || !subscription.is_empty();
                *parts.query_root_fields = query.into_iter().collect();
                *parts.subscription_root_fields = subscription.into_iter().collect();
            }

            if action != Action::Delete {
                *parts.columns = payload.columns.iter().cloned().collect();
            }

            if matches!(action, Action::Insert | Action::Update) {
                if let Some(set) = &payload.set {
                    for (column, value) in set {
                        parts.presets.push_loaded(column.clone(), preset_value(value));
                    }
                }
            }

            if action != Action::Select {
                *parts.backend_only = payload.backend_only;
            }

            if let Some(fields) = &payload.computed_fields {
                *parts.computed_fields = fields.clone();
            }
        }
        state.mark_saved();
        Ok(state)
    }

    /// Compiles the state down to the declarative document, carrying only
    /// the fields that apply to the action. Root-field lists are emitted
    /// from the effective (masked) sets; an empty effective list compiles
    /// to "not customized".
    pub fn compile(&self) -> PermissionPayload {
        let expr = to_external(&self.effective_filter());
        let mut payload = PermissionPayload::default();

        match self.action() {
            Action::Insert => payload.check = Some(expr),
            _ => payload.filter = Some(expr),
        }

        if self.action() != Action::Delete {
            payload.columns = self.columns().iter().cloned().collect();
        }

        match self.action() {
            Action::Select => {
                payload.limit = self.limit();
                payload.allow_aggregations = self.allow_aggregations();
                if self.root_field_customization() {
                    payload.query_root_fields =
                        compiled_root_fields(self, OperationKind::Query);
                    payload.subscription_root_fields =
                        compiled_root_fields(self, OperationKind::Subscription);
                }
            }
            Action::Insert | Action::Update => {
                payload.set = compiled_presets(self);
                payload.backend_only = self.backend_only();
            }
            Action::Delete => {
                payload.backend_only = self.backend_only();
            }
        }

        if !self.computed_fields().is_empty() {
            payload.computed_fields = Some(self.computed_fields().to_vec());
        }
        payload
    }
}

fn compiled_root_fields(
    state: &PermissionState,
    operation: OperationKind,
) -> Option<Vec<RootField>> {
    let effective =
        effective_root_fields(state.root_fields(operation), state.allow_aggregations());
    if effective.is_empty() {
        None
    } else {
        Some(effective.into_iter().collect())
    }
}

/// Rows with an unset column are editor scaffolding and do not reach the
/// document; an empty result means no `set` entry at all.
fn compiled_presets(state: &PermissionState) -> Option<BTreeMap<String, Value>> {
    let mut set = BTreeMap::new();
    for row in state.presets().rows() {
        if row.column.is_empty() {
            continue;
        }
        let value = match &row.value {
            Some(text) => Value::String(text.clone()),
            None => Value::Null,
        };
        set.insert(row.column.clone(), value);
    }
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

fn preset_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
