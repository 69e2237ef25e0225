use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::Semaphore;

use pokin_core::{ReportError, ReportKernel};
use pokin_policy::EnrichmentPolicy;
use pokin_store::{DataError, InMemoryReportSource, ReportSource, RowStream, Schedule};
use pokin_types::{Classification, IndicatorRow, NodeKind, TaggedNodeRow, WorkPlanRow};

const TAG: &str = "Air Bersih";

fn node(id: i64, kind: &str) -> TaggedNodeRow {
    TaggedNodeRow {
        id,
        name: Some(format!("Pohon {id}")),
        year: Some(2024),
        kind: Some(kind.into()),
        org_unit_code: Some("5.01.5.05.0.00.02.0000".into()),
        org_unit_name: Some("Badan Perencanaan".into()),
        tag_note: Some("prioritas".into()),
        status: Some("".into()),
        note: None,
    }
}

fn plan(wp: &str, staff: &str, line: &str, budget: i64) -> WorkPlanRow {
    WorkPlanRow {
        work_plan_id: wp.into(),
        work_plan_title: format!("Rekin {wp}"),
        staff_name: format!("Pegawai {staff}"),
        staff_id: staff.into(),
        sub_activity_code: None,
        sub_activity_name: None,
        budget_line_id: Some(line.into()),
        budget: Some(budget),
        note: Some("".into()),
    }
}

fn kernel(src: InMemoryReportSource, policy: EnrichmentPolicy) -> (ReportKernel, Arc<InMemoryReportSource>) {
    let src = Arc::new(src);
    (ReportKernel::new(src.clone(), policy), src)
}

#[tokio::test]
async fn budget_rows_and_schedule_fold_into_one_work_plan() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(10, "Operational"))
        .with_work_plan_row(10, plan("1", "S1", "b1", 100))
        .with_work_plan_row(10, plan("1", "S1", "b2", 50))
        .with_schedule_entry("1", 2, 30)
        .with_schedule_entry("1", 2, 20);
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    assert_eq!(report.nodes.len(), 1);
    let staff = &report.nodes[0].staff;
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].work_plans.len(), 1);
    let wp = &staff[0].work_plans[0];
    assert_eq!(wp.budget, 150);
    assert_eq!(wp.quarters.tw1, 50);
    assert_eq!(wp.quarters.total(), 50);
}

#[tokio::test]
async fn empty_tag_report_still_has_envelope_fields() {
    let (kernel, _) = kernel(InMemoryReportSource::new(), EnrichmentPolicy::default());
    let report = kernel.tag_report("X", 2024).await.unwrap();
    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({"nama_tagging": "X", "tahun": 2024, "pohon_kinerjas": []})
    );
}

#[tokio::test]
async fn classification_follows_node_kind() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Strategic"))
        .with_tagged_node(TAG, node(2, "Tactical Pemda"))
        .with_tagged_node(TAG, node(3, "Operational"))
        .with_tagged_node(TAG, node(4, "Strategic"))
        .with_area_of_governance(1, Classification::new("1.01", "Pendidikan"))
        .with_program(2, Classification::new("1.01.02", "Program Pengelolaan"))
        // Linked, but an operational node never reports it.
        .with_program(3, Classification::new("9.99.99", "Tidak Dipakai"))
        .with_area_of_governance(3, Classification::new("9.99", "Tidak Dipakai"));
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    let by_id = |id: i64| report.nodes.iter().find(|n| n.id == id).unwrap();

    assert_eq!(by_id(1).area_of_governance.code, "1.01");
    assert!(by_id(1).program.is_unset());
    assert_eq!(by_id(2).program.name, "Program Pengelolaan");
    assert!(by_id(2).area_of_governance.is_unset());
    assert_eq!(by_id(3).kind, NodeKind::Operational);
    assert!(by_id(3).area_of_governance.is_unset());
    assert!(by_id(3).program.is_unset());
    // Strategic but nothing linked.
    assert!(by_id(4).area_of_governance.is_unset());

    let v = serde_json::to_value(by_id(3)).unwrap();
    assert_eq!(v["kode_bidang_urusan"], json!("-"));
    assert_eq!(v["kode_program"], json!("-"));
}

#[tokio::test]
async fn classification_failure_degrades_by_default() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Tactical"))
        .failing_classification();
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    assert!(report.nodes[0].program.is_unset());
}

#[tokio::test]
async fn classification_failure_aborts_under_strict_policy() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Tactical"))
        .failing_classification();
    let (kernel, _) = kernel(src, EnrichmentPolicy::strict());

    let err = kernel.tag_report(TAG, 2024).await.unwrap_err();
    assert!(matches!(err, ReportError::Classification { node_id: 1, .. }));
}

#[tokio::test]
async fn schedule_failure_aborts_the_whole_report_by_default() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Operational"))
        .with_tagged_node(TAG, node(2, "Operational"))
        .with_work_plan_row(2, plan("9", "S1", "b1", 10))
        .failing_schedules();
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());

    let err = kernel.tag_report(TAG, 2024).await.unwrap_err();
    assert!(matches!(err, ReportError::Schedule { node_id: 2, .. }));
}

#[tokio::test]
async fn schedule_failure_leaves_zero_quarters_when_lenient() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Operational"))
        .with_work_plan_row(1, plan("9", "S1", "b1", 10))
        .failing_schedules();
    let (kernel, _) = kernel(src, EnrichmentPolicy::lenient());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    let wp = &report.nodes[0].staff[0].work_plans[0];
    assert_eq!(wp.budget, 10);
    assert_eq!(wp.quarters.total(), 0);
}

#[tokio::test]
async fn work_plan_query_failure_is_a_query_error() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Operational"))
        .failing_work_plans();
    let (kernel, _) = kernel(src, EnrichmentPolicy::lenient());

    let err = kernel.tag_report(TAG, 2024).await.unwrap_err();
    assert!(matches!(err, ReportError::Query(_)));
}

#[tokio::test]
async fn schedules_are_fetched_once_per_node_with_work_plans() {
    let src = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Operational"))
        .with_tagged_node(TAG, node(2, "Operational"))
        .with_tagged_node(TAG, node(3, "Operational"))
        .with_work_plan_row(1, plan("a", "S1", "l1", 1))
        .with_work_plan_row(1, plan("b", "S1", "l2", 1))
        .with_work_plan_row(1, plan("c", "S2", "l3", 1))
        .with_work_plan_row(2, plan("d", "S3", "l4", 1))
        .with_schedule_entry("a", 1, 10)
        .with_schedule_entry("c", 11, 5);
    let (kernel, src) = kernel(src, EnrichmentPolicy::default());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    assert_eq!(src.schedule_calls(), 2);

    let staff = &report.nodes[0].staff;
    assert_eq!(staff[0].work_plans[0].quarters.tw1, 10);
    assert_eq!(staff[0].work_plans[1].quarters.total(), 0);
    assert_eq!(staff[1].work_plans[0].quarters.tw4, 5);
    assert!(report.nodes[2].staff.is_empty());
}

fn indicator_row(node_id: Option<i64>, ind: Option<&str>, tgt: Option<&str>) -> IndicatorRow {
    IndicatorRow {
        program_code: "PU-7".into(),
        tagging_id: 3,
        node_id,
        node_name: Some("Pohon".into()),
        node_year: None,
        node_kind: Some("Strategic".into()),
        org_unit_code: None,
        org_unit_name: None,
        indicator_id: ind.map(Into::into),
        indicator_name: ind.map(|_| "Persentase".into()),
        target_id: tgt.map(Into::into),
        target_value: tgt.map(|_| "75".into()),
        target_unit: tgt.map(|_| "%".into()),
        target_year: None,
    }
}

#[tokio::test]
async fn indicator_tree_for_unknown_code_is_empty() {
    let src = InMemoryReportSource::new().with_indicator_row(indicator_row(Some(1), None, None));
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());
    assert!(kernel.indicator_tree("NOPE").await.unwrap().is_empty());
}

#[tokio::test]
async fn indicator_tree_serializes_detail_fields() {
    let src = InMemoryReportSource::new()
        .with_indicator_row(indicator_row(Some(1), Some("i1"), Some("t1")))
        .with_indicator_row(indicator_row(None, Some("i9"), None))
        .with_indicator_row(indicator_row(Some(2), None, None));
    let (kernel, _) = kernel(src, EnrichmentPolicy::default());

    let nodes = kernel.indicator_tree("PU-7").await.unwrap();
    assert_eq!(nodes.len(), 2);

    let v = serde_json::to_value(&nodes).unwrap();
    assert_eq!(v[0]["kode_program_unggulan"], json!("PU-7"));
    assert_eq!(v[0]["id_tagging"], json!(3));
    assert_eq!(v[0]["tahun"], json!(-1));
    assert_eq!(
        v[0]["indikator"],
        json!([{
            "id_indikator": "i1",
            "indikator": "Persentase",
            "target": [{"id_target": "t1", "target": "75", "satuan": "%", "tahun": 0}]
        }])
    );
    assert_eq!(v[1]["indikator"], json!([]));
}

/// Wraps a source so that every query holds the only connection while it runs.
/// A stream keeps the connection until it is dropped.
struct SingleConnection {
    inner: InMemoryReportSource,
    conn: Arc<Semaphore>,
}

impl SingleConnection {
    fn new(inner: InMemoryReportSource) -> Self {
        Self {
            inner,
            conn: Arc::new(Semaphore::new(1)),
        }
    }

    fn checkout(&self) -> Result<tokio::sync::OwnedSemaphorePermit, DataError> {
        self.conn
            .clone()
            .try_acquire_owned()
            .map_err(|_| DataError::new("pool timed out: connection still held"))
    }

    fn held<'a, T: Send + 'a>(&'a self, rows: RowStream<'a, T>) -> RowStream<'a, T> {
        match self.checkout() {
            Ok(permit) => rows
                .map(move |r| {
                    let _held = &permit;
                    r
                })
                .boxed(),
            Err(e) => stream::iter(std::iter::once(Err(e))).boxed(),
        }
    }
}

#[async_trait]
impl ReportSource for SingleConnection {
    fn tagged_nodes<'a>(&'a self, tag: &'a str, year: i32) -> RowStream<'a, TaggedNodeRow> {
        self.held(self.inner.tagged_nodes(tag, year))
    }

    fn work_plan_rows<'a>(&'a self, node_id: i64) -> RowStream<'a, WorkPlanRow> {
        self.held(self.inner.work_plan_rows(node_id))
    }

    async fn execution_schedules(
        &self,
        work_plan_ids: &[String],
    ) -> Result<HashMap<String, Schedule>, DataError> {
        let _permit = self.checkout()?;
        self.inner.execution_schedules(work_plan_ids).await
    }

    async fn area_of_governance(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        let _permit = self.checkout()?;
        self.inner.area_of_governance(node_id).await
    }

    async fn program(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        let _permit = self.checkout()?;
        self.inner.program(node_id).await
    }

    fn indicator_rows<'a>(&'a self, program_code: &'a str) -> RowStream<'a, IndicatorRow> {
        self.held(self.inner.indicator_rows(program_code))
    }

    async fn ping(&self) -> Result<(), DataError> {
        let _permit = self.checkout()?;
        Ok(())
    }
}

#[tokio::test]
async fn tag_report_completes_with_a_single_pooled_connection() {
    let inner = InMemoryReportSource::new()
        .with_tagged_node(TAG, node(1, "Tactical"))
        .with_tagged_node(TAG, node(2, "Operational"))
        .with_program(1, Classification::new("1.01.02", "Program Pengelolaan"))
        .with_work_plan_row(2, plan("a", "S1", "l1", 40))
        .with_schedule_entry("a", 7, 25);
    let kernel = ReportKernel::new(Arc::new(SingleConnection::new(inner)), EnrichmentPolicy::strict());

    let report = kernel.tag_report(TAG, 2024).await.unwrap();
    assert_eq!(report.nodes.len(), 2);
    assert_eq!(report.nodes[0].program.code, "1.01.02");
    let wp = &report.nodes[1].staff[0].work_plans[0];
    assert_eq!(wp.budget, 40);
    assert_eq!(wp.quarters.tw3, 25);
}
