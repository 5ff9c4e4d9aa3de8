//! Data-binding layer between flat form data and nested data models.
//!
//! Form data is stored as a flat map from binding paths such as
//! `Group[0].Child[1].Field` to string values. This crate converts that
//! map to and from the nested JSON documents the backend expects, and
//! keeps row indices consistent when repeating-group rows are deleted.
//!
//! # Modules
//!
//! - [`path`] - typed binding paths and index utilities
//! - [`codec`] - flatten / unflatten
//! - [`schema`] - data model schema lookup
//! - [`filter`] - payload filtering before save
//! - [`nodes`] - layout expansion into per-row nodes
//! - [`groups`] - repeating-group row deletion and initialization

pub mod codec;
pub mod error;
pub mod filter;
pub mod groups;
pub mod nodes;
pub mod path;
pub mod schema;

pub use codec::{FormData, MAX_ROW_INDEX, flatten, unflatten, unflatten_typed};
pub use error::{BindingError, Result};
pub use filter::filter_for_submit;
pub use groups::{RowShift, init_repeating_groups, remove_group_row, resolve_group, shift_instance_id};
pub use nodes::{Node, expand_layout, index_binding, instance_id, match_instance, row_suffix};
pub use path::{FieldPath, Segment, indices_of, strip_indices};
pub use schema::DataModelSchema;
