//! Member fetch results and error policy.

use appflow_binding::FormData;
use appflow_model::{LayoutSets, LayoutSettings, Layouts, TextResources};
use appflow_validate::CompiledSchema;
use serde_json::Value;

use super::Member;
use crate::error::{FetchError, QueueError};
use crate::fetch::Fetcher;

/// A resource delivered by a queue member.
///
/// Optional resources are `None` when the app does not provide them.
#[derive(Debug, Clone)]
pub enum Loaded {
    FormData {
        /// Data element the data was read from. `None` for stateless data.
        data_element_id: Option<String>,
        form_data: FormData,
    },
    Schema(CompiledSchema),
    LayoutSets(Option<LayoutSets>),
    Layouts {
        layout_set: Option<String>,
        layouts: Layouts,
    },
    LayoutSettings(Option<LayoutSettings>),
    /// Rule handler script.
    RuleModel(Option<String>),
    Dynamics(Option<Value>),
    Texts(TextResources),
    /// Values of data elements referenced by text variables.
    TextData(FormData),
}

impl Loaded {
    pub fn member(&self) -> Member {
        match self {
            Self::FormData { .. } => Member::FormData,
            Self::Schema(_) => Member::Schema,
            Self::LayoutSets(_) => Member::LayoutSets,
            Self::Layouts { .. } => Member::Layout,
            Self::LayoutSettings(_) => Member::LayoutSettings,
            Self::RuleModel(_) => Member::RuleModel,
            Self::Dynamics(_) => Member::Dynamics,
            Self::Texts(_) => Member::Texts,
            Self::TextData(_) => Member::TextData,
        }
    }
}

/// GET a member resource. `Ok(None)` means an optional resource is absent.
pub(super) async fn get_member<F: Fetcher>(
    fetcher: &F,
    member: Member,
    url: &str,
) -> Result<Option<Value>, QueueError> {
    match fetcher.get(url).await {
        Ok(document) => Ok(Some(document)),
        Err(error) => classify(member, error).map(|()| None),
    }
}

/// Like [`get_member`] for resources the queue cannot run without.
pub(super) async fn get_required<F: Fetcher>(fetcher: &F, member: Member, url: &str) -> Result<Value, QueueError> {
    get_member(fetcher, member, url)
        .await?
        .ok_or(QueueError::NotFound {
            resource: member.resource(),
        })
}

/// Map a rejected member fetch to the queue outcome.
///
/// `Ok(())` means an optional resource is absent.
pub(super) fn classify(member: Member, error: FetchError) -> Result<(), QueueError> {
    let resource = member.resource();
    match error.status {
        Some(404) if member.is_optional() => {
            tracing::debug!(%member, "optional resource absent");
            Ok(())
        }
        Some(404) => Err(QueueError::NotFound { resource }),
        Some(403) if member == Member::FormData => Err(QueueError::MissingRoles { resource }),
        _ => Err(QueueError::Member {
            resource,
            source: error,
        }),
    }
}

pub(super) fn invalid(member: Member, reason: impl ToString) -> QueueError {
    QueueError::Invalid {
        resource: member.resource(),
        reason: reason.to_string(),
    }
}

/// Rule handlers are scripts; anything else is kept as JSON text.
pub(super) fn script_text(document: Value) -> String {
    match document {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
