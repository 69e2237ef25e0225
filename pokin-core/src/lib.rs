use std::sync::Arc;

use futures_util::{future, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use pokin_aggregate::{bucket_quarters, IndicatorTreeBuilder, StaffPlanAggregator};
use pokin_policy::{Enrichment, EnrichmentPolicy, FailureMode};
use pokin_store::{DataError, ReportSource};
use pokin_types::{StaffAssignment, TagReport, TaggedNodeRow, TreeNode};

pub mod classify;
pub use classify::ClassificationSlot;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Query(#[from] DataError),
    #[error("classification lookup for node {node_id} failed: {source}")]
    Classification {
        node_id: i64,
        #[source]
        source: DataError,
    },
    #[error("execution schedule for node {node_id} failed: {source}")]
    Schedule {
        node_id: i64,
        #[source]
        source: DataError,
    },
}

/// Builds both reports from a `ReportSource`.
///
/// Each call runs start to finish on the calling task. Nested lookups are issued
/// sequentially: per node one classification lookup (when its kind has one), one
/// work-plan query and one batched schedule query.
pub struct ReportKernel {
    source: Arc<dyn ReportSource>,
    policy: EnrichmentPolicy,
}

impl ReportKernel {
    pub fn new(source: Arc<dyn ReportSource>, policy: EnrichmentPolicy) -> Self {
        Self { source, policy }
    }

    /// All nodes tagged `tag` in `year`, each with classification and staff work plans.
    pub async fn tag_report(&self, tag: &str, year: i32) -> Result<TagReport, ReportError> {
        let span = info_span!("tag_report", request_id = %Uuid::new_v4(), tag, year);
        async move {
            // Drained before enrichment so the node query's connection is released
            // ahead of the per-node lookups.
            let rows: Vec<TaggedNodeRow> = self.source.tagged_nodes(tag, year).try_collect().await?;
            let mut nodes = Vec::with_capacity(rows.len());
            for row in rows {
                let mut node = TreeNode::from_tagged_row(row);
                self.classify(&mut node).await?;
                node.staff = self.staff_assignments(node.id).await?;
                nodes.push(node);
            }
            info!(nodes = nodes.len(), "tag report assembled");
            Ok(TagReport {
                tag: tag.to_string(),
                year,
                nodes,
            })
        }
        .instrument(span)
        .await
    }

    /// Nodes tagged with a program-unggulan code, with their indicators and targets.
    pub async fn indicator_tree(&self, program_code: &str) -> Result<Vec<TreeNode>, ReportError> {
        let span = info_span!("indicator_tree", request_id = %Uuid::new_v4(), program_code);
        async move {
            let mut builder = IndicatorTreeBuilder::new();
            let mut rows = self.source.indicator_rows(program_code);
            while let Some(row) = rows.try_next().await? {
                let tagging_id = row.tagging_id;
                if !builder.push(row) {
                    debug!(tagging_id, "tagging points at a missing node, row skipped");
                }
            }
            let nodes = builder.finish();
            info!(nodes = nodes.len(), "indicator tree assembled");
            Ok(nodes)
        }
        .instrument(span)
        .await
    }

    /// Staff of one node with their work plans, budgets and quarterly weights.
    pub async fn staff_assignments(&self, node_id: i64) -> Result<Vec<StaffAssignment>, ReportError> {
        let mut agg = StaffPlanAggregator::new();
        self.source
            .work_plan_rows(node_id)
            .try_for_each(|row| {
                agg.push(row);
                future::ready(Ok(()))
            })
            .await?;

        for c in agg.conflicts() {
            warn!(
                node_id,
                staff_id = %c.staff_id,
                kept = %c.kept_name,
                other = %c.other_name,
                "staff id appears under different names, keeping the first"
            );
        }
        if agg.is_empty() {
            return Ok(Vec::new());
        }

        let ids = agg.work_plan_ids();
        match self.source.execution_schedules(&ids).await {
            Ok(schedules) => agg.attach_quarters(|id| {
                schedules
                    .get(id)
                    .map(|pairs| bucket_quarters(pairs.iter().copied()))
                    .unwrap_or_default()
            }),
            Err(source) => match self.policy.mode(Enrichment::Schedule) {
                FailureMode::Abort => return Err(ReportError::Schedule { node_id, source }),
                FailureMode::Degrade => {
                    warn!(node_id, error = %source, "execution schedule unavailable, quarters left at zero");
                }
            },
        }
        Ok(agg.finish())
    }

    async fn classify(&self, node: &mut TreeNode) -> Result<(), ReportError> {
        let Some(slot) = ClassificationSlot::for_kind(&node.kind) else {
            return Ok(());
        };
        match classify::lookup(self.source.as_ref(), node.id, slot).await {
            Ok(Some(c)) => slot.assign(node, c),
            Ok(None) => debug!(node_id = node.id, ?slot, "no classification linked"),
            Err(source) => match self.policy.mode(Enrichment::Classification) {
                FailureMode::Abort => {
                    return Err(ReportError::Classification {
                        node_id: node.id,
                        source,
                    })
                }
                FailureMode::Degrade => {
                    warn!(node_id = node.id, ?slot, error = %source, "classification lookup failed, keeping sentinel");
                }
            },
        }
        Ok(())
    }
}
