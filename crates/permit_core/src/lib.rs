mod canonical;
mod context;
mod convert;
mod error;
mod filter;
mod payload;
mod presets;
mod root_fields;
mod state;

pub use canonical::{canonical_hash, encode_canonical_value};
pub use context::TableContext;
pub use convert::{from_external, to_external};
pub use error::{DeserializeError, PolicyError};
pub use filter::{Comparison, Connective, Rule, RuleGroup};
pub use payload::PermissionPayload;
pub use presets::{ColumnPreset, PresetSet};
pub use root_fields::{
    available_root_fields, effective_root_fields, is_checked, is_selectable, toggle_select_all,
    OperationKind, RootField,
};
pub use state::{Action, EditAction, PermissionState, RowCheck};
