use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{MySql, QueryBuilder, Row};

use pokin_types::{Classification, IndicatorRow, TaggedNodeRow, WorkPlanRow};

use crate::{DataError, ReportSource, RowStream, Schedule};

const TAGGED_NODES_SQL: &str = r#"
    SELECT
        CAST(pokin.id AS SIGNED) AS id_pohon,
        pokin.nama_pohon,
        CAST(pokin.tahun AS SIGNED) AS tahun,
        pokin.jenis_pohon,
        pokin.kode_opd,
        opd.nama_opd,
        tag.keterangan_tagging,
        pokin.status,
        pokin.keterangan
    FROM tb_pohon_kinerja pokin
    JOIN tb_operasional_daerah opd ON opd.kode_opd = pokin.kode_opd
    JOIN tb_tagging_pokin tag ON tag.id_pokin = pokin.id
        AND pokin.tahun = ?
        AND pokin.kode_opd != ''
        AND pokin.status IN ('pokin dari pemda', '')
    WHERE tag.nama_tagging = ?
    ORDER BY pokin.id
"#;

const WORK_PLAN_ROWS_SQL: &str = r#"
    SELECT DISTINCT
        CAST(rekin.id AS CHAR) AS id_rekin,
        rekin.nama_rencana_kinerja,
        pegawai.nama,
        CAST(pegawai.nip AS CHAR) AS nip,
        subkegiatan.kode_subkegiatan,
        subkegiatan.nama_subkegiatan,
        CAST(rinbel.id AS CHAR) AS id_rinbel,
        CAST(rinbel.anggaran AS SIGNED) AS anggaran,
        rekin.catatan
    FROM tb_rencana_kinerja rekin
    JOIN tb_pegawai pegawai ON pegawai.nip = rekin.pegawai_id
    JOIN tb_pohon_kinerja pokin ON rekin.id_pohon = pokin.id
    LEFT JOIN tb_subkegiatan_terpilih sub_rekin ON sub_rekin.rekin_id = rekin.id
    LEFT JOIN tb_subkegiatan subkegiatan ON subkegiatan.kode_subkegiatan = sub_rekin.kode_subkegiatan
    LEFT JOIN tb_rencana_aksi renaksi ON renaksi.rencana_kinerja_id = rekin.id
    LEFT JOIN tb_rincian_belanja rinbel ON rinbel.renaksi_id = renaksi.id
    WHERE rekin.kode_opd = pokin.kode_opd AND pokin.id = ?
    ORDER BY id_rekin, id_rinbel
"#;

// Completed with a bound `IN (...)` list.
const SCHEDULES_SQL_PREFIX: &str = r#"
    SELECT
        CAST(rekin.id AS CHAR) AS id_rekin,
        CAST(renaksi.bulan AS SIGNED) AS bulan,
        CAST(renaksi.bobot AS SIGNED) AS bobot
    FROM tb_pelaksanaan_rencana_aksi renaksi
    JOIN tb_rencana_aksi ON tb_rencana_aksi.id = renaksi.rencana_aksi_id
    JOIN tb_rencana_kinerja rekin ON tb_rencana_aksi.rencana_kinerja_id = rekin.id
    WHERE rekin.id IN ("#;

// strategic -> tactical -> operational -> work plan -> sub-activity
const AREA_OF_GOVERNANCE_SQL: &str = r#"
    SELECT bidur.kode_bidang_urusan, bidur.nama_bidang_urusan
    FROM tb_rencana_kinerja rekin
    LEFT JOIN tb_subkegiatan_terpilih sub_rekin ON sub_rekin.rekin_id = rekin.id
    LEFT JOIN tb_bidang_urusan bidur
        ON bidur.kode_bidang_urusan = SUBSTRING(sub_rekin.kode_subkegiatan, 1, 4)
    WHERE rekin.id_pohon IN (
        SELECT pokin.id FROM tb_pohon_kinerja pokin
        WHERE pokin.parent IN (
            SELECT id FROM tb_pohon_kinerja
            WHERE parent = ? AND jenis_pohon IN ('Tactical', 'Tactical Pemda')
        ) AND jenis_pohon IN ('Operational', 'Operational Pemda')
    )
    LIMIT 1
"#;

// tactical -> operational -> work plan -> sub-activity
const PROGRAM_SQL: &str = r#"
    SELECT prg.kode_program, prg.nama_program
    FROM tb_rencana_kinerja rekin
    LEFT JOIN tb_subkegiatan_terpilih sub_rekin ON sub_rekin.rekin_id = rekin.id
    LEFT JOIN tb_master_program prg
        ON prg.kode_program = SUBSTRING(sub_rekin.kode_subkegiatan, 1, 7)
    WHERE rekin.id_pohon IN (
        SELECT pokin.id FROM tb_pohon_kinerja pokin
        WHERE pokin.parent = ? AND jenis_pohon IN ('Operational', 'Operational Pemda')
    )
    LIMIT 1
"#;

const INDICATOR_ROWS_SQL: &str = r#"
    SELECT
        ket.kode_program_unggulan,
        CAST(ket.id_tagging AS SIGNED) AS id_tagging,
        CAST(pokin.id AS SIGNED) AS id_pohon,
        pokin.nama_pohon,
        CAST(pokin.tahun AS SIGNED) AS tahun,
        pokin.jenis_pohon,
        opd.kode_opd,
        opd.nama_opd,
        CAST(ind.id AS CHAR) AS id_indikator,
        ind.indikator,
        CAST(tgt.id AS CHAR) AS id_target,
        tgt.target,
        tgt.satuan,
        CAST(tgt.tahun AS SIGNED) AS tahun_target
    FROM tb_keterangan_tagging_program_unggulan ket
    JOIN tb_tagging_pokin tag ON tag.id = ket.id_tagging
    LEFT JOIN tb_pohon_kinerja pokin ON pokin.id = tag.id_pokin
    LEFT JOIN tb_operasional_daerah opd ON opd.kode_opd = pokin.kode_opd
    LEFT JOIN tb_indikator ind ON ind.pokin_id = pokin.id
    LEFT JOIN tb_target tgt ON tgt.indikator_id = ind.id
    WHERE ket.kode_program_unggulan = ?
    ORDER BY ket.id_tagging, ind.id, tgt.id
"#;

/// Pool sizing for the planning database.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 70,
            idle_timeout: Duration::from_secs(5 * 60),
            max_lifetime: Duration::from_secs(60 * 60),
        }
    }
}

/// MySQL-backed source over the performance-planning schema.
#[derive(Clone)]
pub struct MySqlReportSource {
    pool: MySqlPool,
}

impl MySqlReportSource {
    /// Builds the pool without opening a connection; call `ping` to verify connectivity.
    pub fn connect_lazy(url: &str, settings: &PoolSettings) -> Result<Self, DataError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .max_lifetime(settings.max_lifetime)
            .connect_lazy(url)
            .map_err(|e| DataError::new(format!("invalid database url: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ReportSource for MySqlReportSource {
    fn tagged_nodes<'a>(&'a self, tag: &'a str, year: i32) -> RowStream<'a, TaggedNodeRow> {
        sqlx::query(TAGGED_NODES_SQL)
            .bind(year)
            .bind(tag)
            .fetch(&self.pool)
            .map(|row| decode(row, tagged_node))
            .boxed()
    }

    fn work_plan_rows<'a>(&'a self, node_id: i64) -> RowStream<'a, WorkPlanRow> {
        sqlx::query(WORK_PLAN_ROWS_SQL)
            .bind(node_id)
            .fetch(&self.pool)
            .map(|row| decode(row, work_plan))
            .boxed()
    }

    async fn execution_schedules(
        &self,
        work_plan_ids: &[String],
    ) -> Result<HashMap<String, Schedule>, DataError> {
        let mut schedules: HashMap<String, Schedule> = HashMap::new();
        if work_plan_ids.is_empty() {
            return Ok(schedules);
        }

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(SCHEDULES_SQL_PREFIX);
        let mut ids = qb.separated(", ");
        for id in work_plan_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");

        let mut rows = qb.build().fetch(&self.pool);
        while let Some(row) = rows.try_next().await.map_err(query_error)? {
            let id: String = column(&row, "id_rekin")?;
            let month: i64 = column(&row, "bulan")?;
            let weight: i64 = column(&row, "bobot")?;
            schedules.entry(id).or_default().push((month, weight));
        }
        Ok(schedules)
    }

    async fn area_of_governance(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        let row = sqlx::query(AREA_OF_GOVERNANCE_SQL)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        match row {
            Some(row) => classification(&row, "kode_bidang_urusan", "nama_bidang_urusan"),
            None => Ok(None),
        }
    }

    async fn program(&self, node_id: i64) -> Result<Option<Classification>, DataError> {
        let row = sqlx::query(PROGRAM_SQL)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;
        match row {
            Some(row) => classification(&row, "kode_program", "nama_program"),
            None => Ok(None),
        }
    }

    fn indicator_rows<'a>(&'a self, program_code: &'a str) -> RowStream<'a, IndicatorRow> {
        sqlx::query(INDICATOR_ROWS_SQL)
            .bind(program_code)
            .fetch(&self.pool)
            .map(|row| decode(row, indicator))
            .boxed()
    }

    async fn ping(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(query_error)
    }
}

fn query_error(e: sqlx::Error) -> DataError {
    DataError::new(format!("query error: {e}"))
}

fn decode<T>(
    row: Result<MySqlRow, sqlx::Error>,
    f: fn(&MySqlRow) -> Result<T, DataError>,
) -> Result<T, DataError> {
    row.map_err(query_error).and_then(|r| f(&r))
}

fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, DataError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name)
        .map_err(|e| DataError::new(format!("scan error: {e}")))
}

fn year(row: &MySqlRow, name: &str) -> Result<Option<i32>, DataError> {
    let raw: Option<i64> = column(row, name)?;
    Ok(raw.and_then(|y| i32::try_from(y).ok()))
}

// A master row that failed to join counts as not found.
fn classification(
    row: &MySqlRow,
    code: &str,
    name: &str,
) -> Result<Option<Classification>, DataError> {
    let code: Option<String> = column(row, code)?;
    let name: Option<String> = column(row, name)?;
    Ok(code.map(|code| Classification::new(code, name.unwrap_or_default())))
}

fn tagged_node(row: &MySqlRow) -> Result<TaggedNodeRow, DataError> {
    Ok(TaggedNodeRow {
        id: column(row, "id_pohon")?,
        name: column(row, "nama_pohon")?,
        year: year(row, "tahun")?,
        kind: column(row, "jenis_pohon")?,
        org_unit_code: column(row, "kode_opd")?,
        org_unit_name: column(row, "nama_opd")?,
        tag_note: column(row, "keterangan_tagging")?,
        status: column(row, "status")?,
        note: column(row, "keterangan")?,
    })
}

fn work_plan(row: &MySqlRow) -> Result<WorkPlanRow, DataError> {
    Ok(WorkPlanRow {
        work_plan_id: column(row, "id_rekin")?,
        work_plan_title: column::<Option<String>>(row, "nama_rencana_kinerja")?.unwrap_or_default(),
        staff_name: column::<Option<String>>(row, "nama")?.unwrap_or_default(),
        staff_id: column(row, "nip")?,
        sub_activity_code: column(row, "kode_subkegiatan")?,
        sub_activity_name: column(row, "nama_subkegiatan")?,
        budget_line_id: column(row, "id_rinbel")?,
        budget: column(row, "anggaran")?,
        note: column(row, "catatan")?,
    })
}

fn indicator(row: &MySqlRow) -> Result<IndicatorRow, DataError> {
    Ok(IndicatorRow {
        program_code: column::<Option<String>>(row, "kode_program_unggulan")?.unwrap_or_default(),
        tagging_id: column(row, "id_tagging")?,
        node_id: column(row, "id_pohon")?,
        node_name: column(row, "nama_pohon")?,
        node_year: year(row, "tahun")?,
        node_kind: column(row, "jenis_pohon")?,
        org_unit_code: column(row, "kode_opd")?,
        org_unit_name: column(row, "nama_opd")?,
        indicator_id: column(row, "id_indikator")?,
        indicator_name: column(row, "indikator")?,
        target_id: column(row, "id_target")?,
        target_value: column(row, "target")?,
        target_unit: column(row, "satuan")?,
        target_year: year(row, "tahun_target")?,
    })
}
