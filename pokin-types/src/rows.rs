//! Flat tuples as produced by the join queries. Every nullable column is an `Option`.

/// One node matched by a tag + year query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaggedNodeRow {
    pub id: i64,
    pub name: Option<String>,
    pub year: Option<i32>,
    pub kind: Option<String>,
    pub org_unit_code: Option<String>,
    pub org_unit_name: Option<String>,
    pub tag_note: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
}

/// Work plan x staff x sub-activity x budget line, for one node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkPlanRow {
    pub work_plan_id: String,
    pub work_plan_title: String,
    pub staff_name: String,
    pub staff_id: String,
    pub sub_activity_code: Option<String>,
    pub sub_activity_name: Option<String>,
    /// Budget line the amount came from; rows repeating a line id are counted once.
    pub budget_line_id: Option<String>,
    pub budget: Option<i64>,
    pub note: Option<String>,
}

/// Program code x tagging x node x indicator x target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndicatorRow {
    pub program_code: String,
    pub tagging_id: i64,
    /// NULL when the tagging points at a node that no longer exists.
    pub node_id: Option<i64>,
    pub node_name: Option<String>,
    pub node_year: Option<i32>,
    pub node_kind: Option<String>,
    pub org_unit_code: Option<String>,
    pub org_unit_name: Option<String>,
    pub indicator_id: Option<String>,
    pub indicator_name: Option<String>,
    pub target_id: Option<String>,
    pub target_value: Option<String>,
    pub target_unit: Option<String>,
    pub target_year: Option<i32>,
}
