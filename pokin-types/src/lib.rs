use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub mod rows;
pub use rows::{IndicatorRow, TaggedNodeRow, WorkPlanRow};

/// Marker written for a classification that does not apply or was not found.
pub const UNSET: &str = "-";

/// Kind of a performance-tree node (`jenis_pohon`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Strategic,
    StrategicRegional,
    Tactical,
    TacticalRegional,
    Operational,
    OperationalRegional,
    Other(String),
}

impl NodeKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Strategic" => NodeKind::Strategic,
            "Strategic Pemda" => NodeKind::StrategicRegional,
            "Tactical" => NodeKind::Tactical,
            "Tactical Pemda" => NodeKind::TacticalRegional,
            "Operational" => NodeKind::Operational,
            "Operational Pemda" => NodeKind::OperationalRegional,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Strategic => "Strategic",
            NodeKind::StrategicRegional => "Strategic Pemda",
            NodeKind::Tactical => "Tactical",
            NodeKind::TacticalRegional => "Tactical Pemda",
            NodeKind::Operational => "Operational",
            NodeKind::OperationalRegional => "Operational Pemda",
            NodeKind::Other(raw) => raw,
        }
    }

    /// Strategic nodes are classified by area of governance.
    pub fn is_strategic(&self) -> bool {
        matches!(self, NodeKind::Strategic | NodeKind::StrategicRegional)
    }

    /// Tactical nodes are classified by program.
    pub fn is_tactical(&self) -> bool {
        matches!(self, NodeKind::Tactical | NodeKind::TacticalRegional)
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Other(String::new())
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Code/name pair resolved from a node's descendants.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Classification {
    pub code: String,
    pub name: String,
}

impl Classification {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn unset() -> Self {
        Self::new(UNSET, UNSET)
    }

    pub fn is_unset(&self) -> bool {
        self.code == UNSET && self.name == UNSET
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::unset()
    }
}

/// Planned execution weight per quarter (`tw` = triwulan).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct QuarterSplit {
    pub tw1: i64,
    pub tw2: i64,
    pub tw3: i64,
    pub tw4: i64,
}

impl QuarterSplit {
    pub fn total(&self) -> i64 {
        self.tw1 + self.tw2 + self.tw3 + self.tw4
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct WorkPlan {
    #[serde(rename = "id_rekin")]
    pub id: String,
    #[serde(rename = "rencana_kinerja")]
    pub title: String,
    #[serde(rename = "kode_subkegiatan")]
    pub sub_activity_code: String,
    #[serde(rename = "nama_subkegiatan")]
    pub sub_activity_name: String,
    #[serde(rename = "pagu")]
    pub budget: i64,
    #[serde(rename = "catatan")]
    pub note: String,
    #[serde(rename = "tahapan_pelaksanaan")]
    pub quarters: QuarterSplit,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StaffAssignment {
    #[serde(rename = "nama_pelaksana")]
    pub staff_name: String,
    #[serde(rename = "nip_pelaksana")]
    pub staff_id: String,
    #[serde(rename = "rencana_kinerjas")]
    pub work_plans: Vec<WorkPlan>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Target {
    #[serde(rename = "id_target")]
    pub id: String,
    #[serde(rename = "target")]
    pub value: String,
    #[serde(rename = "satuan")]
    pub unit: String,
    #[serde(rename = "tahun", serialize_with = "zero_if_absent")]
    pub year: Option<i32>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Indicator {
    #[serde(rename = "id_indikator")]
    pub id: String,
    #[serde(rename = "indikator")]
    pub name: String,
    #[serde(rename = "target")]
    pub targets: Vec<Target>,
}

/// One performance-tree node with whichever children the report asked for.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TreeNode {
    pub program_code: Option<String>,
    pub tagging_id: Option<i64>,
    pub id: i64,
    pub year: Option<i32>,
    pub name: String,
    pub org_unit_code: String,
    pub org_unit_name: String,
    pub kind: NodeKind,
    pub tag_note: String,
    pub status: String,
    pub note: String,
    pub area_of_governance: Classification,
    pub program: Classification,
    pub staff: Vec<StaffAssignment>,
    pub indicators: Vec<Indicator>,
}

// Field names follow the report consumers' existing JSON contract.
impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let optional = self.program_code.is_some() as usize + self.tagging_id.is_some() as usize;
        let mut s = serializer.serialize_struct("TreeNode", 15 + optional)?;
        if let Some(code) = &self.program_code {
            s.serialize_field("kode_program_unggulan", code)?;
        }
        if let Some(id) = self.tagging_id {
            s.serialize_field("id_tagging", &id)?;
        }
        s.serialize_field("id_pohon", &self.id)?;
        s.serialize_field("tahun", &self.year.unwrap_or(-1))?;
        s.serialize_field("nama_pohon", &self.name)?;
        s.serialize_field("kode_opd", &self.org_unit_code)?;
        s.serialize_field("nama_opd", &self.org_unit_name)?;
        s.serialize_field("jenis_pohon", &self.kind)?;
        s.serialize_field("keterangan_tagging", &self.tag_note)?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("keterangan", &self.note)?;
        s.serialize_field("kode_bidang_urusan", &self.area_of_governance.code)?;
        s.serialize_field("nama_bidang_urusan", &self.area_of_governance.name)?;
        s.serialize_field("kode_program", &self.program.code)?;
        s.serialize_field("nama_program", &self.program.name)?;
        s.serialize_field("pelaksanas", &self.staff)?;
        s.serialize_field("indikator", &self.indicators)?;
        s.end()
    }
}

impl TreeNode {
    /// Node as read from a tagging join, with sentinel classifications and no children.
    pub fn from_tagged_row(row: TaggedNodeRow) -> Self {
        Self {
            id: row.id,
            year: row.year,
            name: row.name.unwrap_or_default(),
            org_unit_code: row.org_unit_code.unwrap_or_default(),
            org_unit_name: row.org_unit_name.unwrap_or_default(),
            kind: row.kind.as_deref().map(NodeKind::parse).unwrap_or_default(),
            tag_note: row.tag_note.unwrap_or_default(),
            status: row.status.unwrap_or_default(),
            note: row.note.unwrap_or_default(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TagReport {
    #[serde(rename = "nama_tagging")]
    pub tag: String,
    #[serde(rename = "tahun")]
    pub year: i32,
    #[serde(rename = "pohon_kinerjas")]
    pub nodes: Vec<TreeNode>,
}

/// Response envelope shared by both reports.
#[derive(Clone, Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: String,
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            status: 200,
            message: message.into(),
            data,
        }
    }
}

fn zero_if_absent<S: Serializer>(year: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(year.unwrap_or(0))
}
