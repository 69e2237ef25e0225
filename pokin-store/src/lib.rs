use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use pokin_types::{Classification, IndicatorRow, TaggedNodeRow, WorkPlanRow};

pub mod mysql;
pub use mysql::{MySqlReportSource, PoolSettings};

pub mod mem;
pub use mem::InMemoryReportSource;

/// Flat rows straight off a join, decoded one at a time.
pub type RowStream<'a, T> = BoxStream<'a, Result<T, DataError>>;

/// `(month, weight)` pairs of one work plan's execution schedule.
pub type Schedule = Vec<(i64, i64)>;

/// Node statuses that are eligible for the tag report.
pub const REPORTABLE_STATUSES: [&str; 2] = ["pokin dari pemda", ""];

#[derive(Debug, Error)]
#[error("{message}")]
pub struct DataError {
    pub message: String,
}

impl DataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything the reports read from the planning database goes through this trait.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Nodes tagged `tag` for `year`, restricted to reportable statuses and a non-empty org unit.
    fn tagged_nodes<'a>(&'a self, tag: &'a str, year: i32) -> RowStream<'a, TaggedNodeRow>;

    /// Work plan x staff x sub-activity x budget line rows for one node.
    fn work_plan_rows<'a>(&'a self, node_id: i64) -> RowStream<'a, WorkPlanRow>;

    /// Execution schedules for many work plans in one round trip.
    ///
    /// Work plans without schedule rows are absent from the map.
    async fn execution_schedules(
        &self,
        work_plan_ids: &[String],
    ) -> Result<HashMap<String, Schedule>, DataError>;

    /// Area of governance of a strategic node, resolved two levels down.
    async fn area_of_governance(&self, node_id: i64) -> Result<Option<Classification>, DataError>;

    /// Program of a tactical node, resolved one level down.
    async fn program(&self, node_id: i64) -> Result<Option<Classification>, DataError>;

    /// Node x indicator x target rows for a program-unggulan code.
    fn indicator_rows<'a>(&'a self, program_code: &'a str) -> RowStream<'a, IndicatorRow>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), DataError>;
}
