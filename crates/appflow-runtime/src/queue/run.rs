//! Running a queue: member futures, the join loop and fulfilment.

use std::future::Future;

use appflow_binding::{FormData, flatten};
use appflow_model::{DataElement, LayoutSets, LayoutSettings, Layouts, TextResources};
use appflow_validate::CompiledSchema;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{FuturesUnordered, StreamExt};

use super::members::{classify, get_member, get_required, invalid, script_text};
use super::{CompletionBarrier, Loaded, Member, QueueKind, QueueSupervisor};
use crate::error::QueueError;
use crate::fetch::Fetcher;
use crate::urls::AppUrls;

type MemberFuture<'a> = BoxFuture<'a, (Member, Result<Loaded, QueueError>)>;

/// What a data or stateless queue needs to know before it starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQueuePlan {
    /// Current process task. `None` for stateless entry.
    pub task_id: Option<String>,
    /// Form data type of the task, from application metadata.
    pub data_type: Option<String>,
    /// Data element holding the form data of the task.
    pub data_element_id: Option<String>,
    /// Layout set shown on stateless entry.
    pub stateless_layout_set: Option<String>,
}

impl DataQueuePlan {
    pub fn kind(&self) -> QueueKind {
        if self.stateless_layout_set.is_some() {
            QueueKind::Stateless
        } else {
            QueueKind::DataTask
        }
    }

    /// Pick the layout set and data type once layout sets are known.
    fn target(&self, sets: Option<&LayoutSets>) -> Result<Target, QueueError> {
        if let Some(set_id) = &self.stateless_layout_set {
            let set = sets
                .ok_or(QueueError::NotFound {
                    resource: Member::LayoutSets.resource(),
                })?
                .by_id(set_id)
                .ok_or_else(|| invalid(Member::LayoutSets, format!("no layout set '{set_id}'")))?;
            return Ok(Target {
                layout_set: Some(set.id.clone()),
                data_type: set.data_type.clone(),
            });
        }

        let data_type = self
            .data_type
            .clone()
            .ok_or(QueueError::MissingContext { what: "data type" })?;
        let layout_set = sets.and_then(|sets| {
            self.task_id
                .as_deref()
                .and_then(|task| sets.for_task(task))
                .or_else(|| sets.for_data_type(&data_type))
                .map(|set| set.id.clone())
        });
        Ok(Target { layout_set, data_type })
    }
}

/// Layout set and data type a data queue loads.
#[derive(Debug, Clone)]
struct Target {
    layout_set: Option<String>,
    data_type: String,
}

type TargetFuture<'a> = Shared<BoxFuture<'a, Result<(Option<LayoutSets>, Target), QueueError>>>;

type TextsFuture<'a> = Shared<BoxFuture<'a, Result<TextResources, QueueError>>>;

/// What an info queue needs to know before it starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoQueuePlan {
    pub task_id: Option<String>,
    /// Data elements of the instance.
    pub data_elements: Vec<DataElement>,
}

/// Run a data or stateless queue to completion.
///
/// Returns the loaded resources in completion order. On failure the
/// supervisor records the error and the queue stays unfinished.
pub async fn run_data_queue<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    plan: &DataQueuePlan,
    supervisor: &mut QueueSupervisor,
) -> Result<Vec<Loaded>, QueueError> {
    let kind = plan.kind();
    if kind == QueueKind::DataTask && plan.data_element_id.is_none() {
        let error = QueueError::MissingContext { what: "data element" };
        supervisor.fail(kind, error.clone());
        return Err(error);
    }

    let target: TargetFuture<'_> = resolve_target(fetcher, urls, plan).boxed().shared();

    let members = vec![
        member(Member::FormData, form_data(fetcher, urls, plan, target.clone())),
        member(Member::Schema, schema(fetcher, urls, target.clone())),
        member(Member::LayoutSets, layout_sets(target.clone())),
        member(Member::Layout, layouts(fetcher, urls, target.clone())),
        member(Member::LayoutSettings, layout_settings(fetcher, urls, target.clone())),
        member(Member::RuleModel, rule_model(fetcher, urls, target.clone())),
        member(Member::Dynamics, dynamics(fetcher, urls, target)),
    ];
    drive(kind, members, supervisor).await
}

/// Run the info queue: text resources, then the data their variables read.
pub async fn run_info_queue<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    plan: &InfoQueuePlan,
    supervisor: &mut QueueSupervisor,
) -> Result<Vec<Loaded>, QueueError> {
    let texts: TextsFuture<'_> = fetch_texts(fetcher, urls).boxed().shared();
    let members = vec![
        member(Member::Texts, texts.clone().map(|result| result.map(Loaded::Texts))),
        member(Member::TextData, text_data(fetcher, urls, plan, texts)),
    ];
    drive(QueueKind::InfoTask, members, supervisor).await
}

async fn resolve_target<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    plan: &DataQueuePlan,
) -> Result<(Option<LayoutSets>, Target), QueueError> {
    let sets = get_member(fetcher, Member::LayoutSets, &urls.layout_sets())
        .await?
        .map(serde_json::from_value::<LayoutSets>)
        .transpose()
        .map_err(|e| invalid(Member::LayoutSets, e))?;
    let target = plan.target(sets.as_ref())?;
    Ok((sets, target))
}

async fn fetch_texts<F: Fetcher>(fetcher: &F, urls: &AppUrls) -> Result<TextResources, QueueError> {
    let document = get_required(fetcher, Member::Texts, &urls.texts()).await?;
    serde_json::from_value(document).map_err(|e| invalid(Member::Texts, e))
}

/// Poll every member on this task and fulfil the queue once all are in.
async fn drive(
    kind: QueueKind,
    members: Vec<MemberFuture<'_>>,
    supervisor: &mut QueueSupervisor,
) -> Result<Vec<Loaded>, QueueError> {
    let mut barrier = CompletionBarrier::enter(kind.members().iter().copied());
    let mut pending: FuturesUnordered<_> = members.into_iter().collect();
    let mut loaded = Vec::with_capacity(pending.len());

    while let Some((member, result)) = pending.next().await {
        match result {
            Ok(resource) => {
                supervisor.member_fulfilled(kind, member);
                barrier.observe(member);
                loaded.push(resource);
            }
            Err(error) => {
                tracing::warn!(queue = %kind, %member, error = %error, "member failed");
                supervisor.fail(kind, error.clone());
                return Err(error);
            }
        }
    }

    if !barrier.is_complete() {
        let missing: Vec<&str> = barrier.missing().iter().map(Member::resource).collect();
        let error = QueueError::Invalid {
            resource: "queue",
            reason: format!("members never completed: {}", missing.join(", ")),
        };
        supervisor.fail(kind, error.clone());
        return Err(error);
    }
    supervisor.fulfil(kind);
    Ok(loaded)
}

/// Tag a member's load with its name.
fn member<'a>(
    member: Member,
    load: impl Future<Output = Result<Loaded, QueueError>> + Send + 'a,
) -> MemberFuture<'a> {
    load.map(move |result| (member, result)).boxed()
}

async fn form_data<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    plan: &DataQueuePlan,
    target: TargetFuture<'_>,
) -> Result<Loaded, QueueError> {
    if let Some(element_id) = &plan.data_element_id {
        let url = urls
            .data_element(element_id)
            .ok_or(QueueError::MissingContext { what: "instance" })?;
        let document = get_required(fetcher, Member::FormData, &url).await?;
        return Ok(Loaded::FormData {
            data_element_id: Some(element_id.clone()),
            form_data: flatten(&document),
        });
    }

    let (_, target) = target.await?;
    let document = fetcher
        .post(&urls.stateless_data(&target.data_type), None)
        .await
        .map_err(|error| match classify(Member::FormData, error) {
            Ok(()) => QueueError::NotFound {
                resource: Member::FormData.resource(),
            },
            Err(error) => error,
        })?;
    Ok(Loaded::FormData {
        data_element_id: None,
        form_data: flatten(&document),
    })
}

async fn schema<F: Fetcher>(fetcher: &F, urls: &AppUrls, target: TargetFuture<'_>) -> Result<Loaded, QueueError> {
    let (_, target) = target.await?;
    let document = get_required(fetcher, Member::Schema, &urls.json_schema(&target.data_type)).await?;
    let compiled = CompiledSchema::compile(document).map_err(|e| invalid(Member::Schema, e))?;
    Ok(Loaded::Schema(compiled))
}

async fn layout_sets(target: TargetFuture<'_>) -> Result<Loaded, QueueError> {
    target.await.map(|(sets, _)| Loaded::LayoutSets(sets))
}

async fn layouts<F: Fetcher>(fetcher: &F, urls: &AppUrls, target: TargetFuture<'_>) -> Result<Loaded, QueueError> {
    let (_, target) = target.await?;
    let url = urls.layouts(target.layout_set.as_deref());
    let document = get_required(fetcher, Member::Layout, &url).await?;
    let layouts = Layouts::from_document(&document).map_err(|e| invalid(Member::Layout, e))?;
    Ok(Loaded::Layouts {
        layout_set: target.layout_set,
        layouts,
    })
}

async fn layout_settings<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    target: TargetFuture<'_>,
) -> Result<Loaded, QueueError> {
    let (_, target) = target.await?;
    let url = urls.layout_settings(target.layout_set.as_deref());
    let settings = get_member(fetcher, Member::LayoutSettings, &url)
        .await?
        .map(|document| LayoutSettings::from_document(&document))
        .transpose()
        .map_err(|e| invalid(Member::LayoutSettings, e))?;
    Ok(Loaded::LayoutSettings(settings))
}

async fn rule_model<F: Fetcher>(fetcher: &F, urls: &AppUrls, target: TargetFuture<'_>) -> Result<Loaded, QueueError> {
    let (_, target) = target.await?;
    let url = urls.rule_handler(target.layout_set.as_deref());
    let script = get_member(fetcher, Member::RuleModel, &url).await?.map(script_text);
    Ok(Loaded::RuleModel(script))
}

async fn dynamics<F: Fetcher>(fetcher: &F, urls: &AppUrls, target: TargetFuture<'_>) -> Result<Loaded, QueueError> {
    let (_, target) = target.await?;
    let url = urls.rule_configuration(target.layout_set.as_deref());
    let dynamics = get_member(fetcher, Member::Dynamics, &url).await?;
    Ok(Loaded::Dynamics(dynamics))
}

async fn text_data<F: Fetcher>(
    fetcher: &F,
    urls: &AppUrls,
    plan: &InfoQueuePlan,
    texts: TextsFuture<'_>,
) -> Result<Loaded, QueueError> {
    let texts = texts.await?;
    let mut merged = FormData::new();
    for data_type in texts.data_model_sources() {
        let Some(element) = plan.data_elements.iter().find(|e| e.data_type == data_type) else {
            tracing::debug!(%data_type, "no data element for text variables");
            continue;
        };
        let url = urls
            .data_element(&element.id)
            .ok_or(QueueError::MissingContext { what: "instance" })?;
        let document = get_required(fetcher, Member::TextData, &url).await?;
        merged.extend(flatten(&document));
    }
    Ok(Loaded::TextData(merged))
}
