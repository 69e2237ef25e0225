use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use pokin_types::{Classification, IndicatorRow, TaggedNodeRow, WorkPlanRow};

use crate::{DataError, ReportSource, RowStream, Schedule, REPORTABLE_STATUSES};

/// In-memory report source holding pre-joined rows.
///
/// Applies the same filters the SQL queries do, so reports built on it behave like the
/// database-backed ones. Individual lookups can be told to fail to exercise error paths.
#[derive(Default)]
pub struct InMemoryReportSource {
    tagged: Vec<(String, TaggedNodeRow)>,
    work_plans: HashMap<i64, Vec<WorkPlanRow>>,
    schedules: HashMap<String, Schedule>,
    areas: HashMap<i64, Classification>,
    programs: HashMap<i64, Classification>,
    indicators: Vec<IndicatorRow>,
    fail_classification: bool,
    fail_schedules: bool,
    fail_work_plans: bool,
    fail_indicators: bool,
    schedule_calls: AtomicUsize,
}

impl InMemoryReportSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tagged_node(mut self, tag: &str, row: TaggedNodeRow) -> Self {
        self.tagged.push((tag.to_string(), row));
        self
    }

    pub fn with_work_plan_row(mut self, node_id: i64, row: WorkPlanRow) -> Self {
        self.work_plans.entry(node_id).or_default().push(row);
        self
    }

    pub fn with_schedule_entry(mut self, work_plan_id: &str, month: i64, weight: i64) -> Self {
        self.schedules
            .entry(work_plan_id.to_string())
            .or_default()
            .push((month, weight));
        self
    }

    pub fn with_area_of_governance(mut self, node_id: i64, c: Classification) -> Self {
        self.areas.insert(node_id, c);
        self
    }

    pub fn with_program(mut self, node_id: i64, c: Classification) -> Self {
        self.programs.insert(node_id, c);
        self
    }

    pub fn with_indicator_row(mut self, row: IndicatorRow) -> Self {
        self.indicators.push(row);
        self
    }

    pub fn failing_classification(mut self) -> Self {
        self.fail_classification = true;
        self
    }

    pub fn failing_schedules(mut self) -> Self {
        self.fail_schedules = true;
        self
    }

    pub fn failing_work_plans(mut self) -> Self {
        self.fail_work_plans = true;
        self
    }

    pub fn failing_indicators(mut self) -> Self {
        self.fail_indicators = true;
        self
    }

    /// Number of `execution_schedules` round trips served so far.
    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::Relaxed)
    }
}

fn rows<'a, T: Send + 'a>(items: Vec<T>) -> RowStream<'a, T> {
    stream::iter(items.into_iter().map(Ok)).boxed()
}

fn failing<'a, T: Send + 'a>(message: &str) -> RowStream<'a, T> {
    stream::iter(std::iter::once(Err(DataError::new(message)))).boxed()
}

#[async_trait]
impl ReportSource for InMemoryReportSource {
    fn tagged_nodes<'a>(&'a self, tag: &'a str, year: i32) -> RowStream<'a, TaggedNodeRow> {
        let matched = self
            .tagged
            .iter()
            .filter(|(t, row)| {
                t == tag
                    && row.year == Some(year)
                    && row.org_unit_code.as_deref().is_some_and(|c| !c.is_empty())
                    && row
                        .status
                        .as_deref()
                        .is_some_and(|s| REPORTABLE_STATUSES.contains(&s))
            })
            .map(|(_, row)| row.clone())
            .collect();
        rows(matched)
    }

    fn work_plan_rows<'a>(&'a self, node_id: i64) -> RowStream<'a, WorkPlanRow> {
        if self.fail_work_plans {
            return failing("query error: work plan rows unavailable");
        }
        rows(self.work_plans.get(&node_id).cloned().unwrap_or_default())
    }

    async fn execution_schedules(
        &self,
        work_plan_ids: &[String],
    ) -> Result<HashMap<String, Schedule>, DataError> {
        self.schedule_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_schedules {
            return Err(DataError::new("query error: execution schedule unavailable"));
        }
        Ok(work_plan_ids
            .iter()
            .filter_map(|id| self.schedules.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    async fn area_of_governance(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        if self.fail_classification {
            return Err(DataError::new("query error: area of governance unavailable"));
        }
        Ok(self.areas.get(&node_id).cloned())
    }

    async fn program(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        if self.fail_classification {
            return Err(DataError::new("query error: program unavailable"));
        }
        Ok(self.programs.get(&node_id).cloned())
    }

    fn indicator_rows<'a>(&'a self, program_code: &'a str) -> RowStream<'a, IndicatorRow> {
        if self.fail_indicators {
            return failing("query error: indicator rows unavailable");
        }
        let matched = self
            .indicators
            .iter()
            .filter(|row| row.program_code == program_code)
            .cloned()
            .collect();
        rows(matched)
    }

    async fn ping(&self) -> Result<(), DataError> {
        Ok(())
    }
}
