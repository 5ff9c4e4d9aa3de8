//! Domain types shared by the app-frontend runtime crates.
//!
//! This crate holds the plain data the rest of the workspace operates on:
//!
//! - [`layout`]: form layouts, components and layout settings
//! - [`repeating`]: rendered row counts per repeating group instance
//! - [`process`]: server-declared process task type and state
//! - [`metadata`]: application metadata, instance and layout sets
//! - [`text`]: text resources and the validation message catalogue
//!
//! Nothing here performs I/O. Parsing helpers accept already-decoded
//! `serde_json::Value` documents as delivered by the fetch layer.

pub mod error;
pub mod layout;
pub mod metadata;
pub mod process;
pub mod repeating;
pub mod text;

pub use error::{ModelError, Result};
pub use layout::{Component, ComponentKind, Layout, LayoutSettings, Layouts};
pub use metadata::{
    ApplicationMetadata, DataElement, DataType, Instance, LayoutSet, LayoutSets, OnEntry,
};
pub use process::{CurrentTask, ProcessResponse, ProcessState, TaskType};
pub use repeating::{RepeatingGroup, RepeatingGroups};
pub use text::{Messages, TextResource, TextResources, TextVariable};
