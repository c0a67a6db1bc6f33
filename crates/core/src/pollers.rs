// Task-queue poller aggregation
//
// A task queue has two independent halves (workflow and activity), each
// described by its own backend call. Both calls are issued concurrently and
// combined either as a merged-by-identity view or as the raw concatenation.
//
// The merge is an explicit fold into a BTreeMap keyed by poller identity:
// - lastAccessTime is the maximum observed for the identity
// - taskQueueTypes is the set of halves the identity was seen on, in first
//   observed order, without duplicates

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::Result;
use crate::execution::{PollerInfo, TaskQueueDescription, TaskQueueDescriptor, TaskQueueType};
use crate::traits::{AccessContext, WorkflowService};

/// One worker identity across both halves of a task queue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MergedPoller {
    pub last_access_time: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub task_queue_types: Vec<TaskQueueType>,
}

/// Pollers keyed by identity
pub type MergedPollers = BTreeMap<String, MergedPoller>;

/// Fold one poller list into the accumulator.
pub fn fold_pollers(
    mut acc: MergedPollers,
    queue_type: TaskQueueType,
    pollers: &[PollerInfo],
) -> MergedPollers {
    for poller in pollers {
        let entry = acc
            .entry(poller.identity.clone())
            .or_insert_with(|| MergedPoller {
                last_access_time: None,
                task_queue_types: Vec::new(),
            });

        // None sorts below every timestamp
        if poller.last_access_time > entry.last_access_time {
            entry.last_access_time = poller.last_access_time;
        }
        if !entry.task_queue_types.contains(&queue_type) {
            entry.task_queue_types.push(queue_type);
        }
    }
    acc
}

/// Merge both halves: workflow pollers are folded first, then activity.
pub fn merge_pollers(workflow: &[PollerInfo], activity: &[PollerInfo]) -> MergedPollers {
    let acc = fold_pollers(MergedPollers::new(), TaskQueueType::Workflow, workflow);
    fold_pollers(acc, TaskQueueType::Activity, activity)
}

/// Describes both halves of a task queue
pub struct PollerService {
    service: Arc<dyn WorkflowService>,
}

impl PollerService {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    async fn describe_both(
        &self,
        ctx: &AccessContext,
        namespace: &str,
        queue: &str,
    ) -> Result<(TaskQueueDescription, TaskQueueDescription)> {
        let descriptor = |queue_type: TaskQueueType| TaskQueueDescriptor {
            namespace: namespace.to_string(),
            name: queue.to_string(),
            queue_type,
        };
        let activity = descriptor(TaskQueueType::Activity);
        let workflow = descriptor(TaskQueueType::Workflow);

        let (activity, workflow) = futures::try_join!(
            self.service.describe_task_queue(ctx, &activity),
            self.service.describe_task_queue(ctx, &workflow),
        )?;
        Ok((activity, workflow))
    }

    /// Pollers merged by identity
    pub async fn merged(
        &self,
        ctx: &AccessContext,
        namespace: &str,
        queue: &str,
    ) -> Result<MergedPollers> {
        let (activity, workflow) = self.describe_both(ctx, namespace, queue).await?;
        let merged = merge_pollers(&workflow.poller_infos(), &activity.poller_infos());

        tracing::debug!(
            namespace = %namespace,
            task_queue = %queue,
            activity_pollers = activity.pollers.len(),
            workflow_pollers = workflow.pollers.len(),
            identities = merged.len(),
            "Merged task queue pollers"
        );
        Ok(merged)
    }

    /// Activity pollers followed by workflow pollers, unmerged and untouched
    pub async fn combined(
        &self,
        ctx: &AccessContext,
        namespace: &str,
        queue: &str,
    ) -> Result<TaskQueueDescription> {
        let (activity, workflow) = self.describe_both(ctx, namespace, queue).await?;
        let mut pollers = activity.pollers;
        pollers.extend(workflow.pollers);
        Ok(TaskQueueDescription { pollers })
    }
}
