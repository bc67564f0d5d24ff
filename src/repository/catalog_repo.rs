// ==========================================
// 物流运营报表系统 - 目录数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: segment / metric 表的查询与种子写入
// 说明: metric.is_active = 0 表示指标已移出当前目录快照
// ==========================================

use crate::domain::catalog::{Metric, Segment, SegmentSeed};
use crate::domain::types::{Aggregation, FormulaKind, SegmentCode, ValueType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 目录仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 将文本列解析为封闭枚举，失败时转为 rusqlite 转换错误
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> SqliteResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_segment(row: &Row<'_>) -> SqliteResult<Segment> {
    Ok(Segment {
        segment_id: row.get(0)?,
        code: parse_column::<SegmentCode>(row, 1)?,
        name: row.get(2)?,
    })
}

fn map_metric(row: &Row<'_>) -> SqliteResult<Metric> {
    let code: String = row.get(2)?;
    let formula_raw: Option<String> = row.get(7)?;
    // 未知公式标识不致命：该指标保持“无数据”
    let formula = formula_raw.and_then(|raw| match FormulaKind::from_str(&raw) {
        Ok(kind) => Some(kind),
        Err(e) => {
            tracing::warn!(metric_code = %code, "指标公式标识无法识别，按无公式处理: {}", e);
            None
        }
    });

    Ok(Metric {
        metric_id: row.get(0)?,
        segment_id: row.get(1)?,
        code,
        name: row.get(3)?,
        is_editable: row.get::<_, i32>(4)? != 0,
        value_type: parse_column::<ValueType>(row, 5)?,
        aggregation: parse_column::<Aggregation>(row, 6)?,
        formula,
        order_index: row.get(8)?,
    })
}

const METRIC_COLUMNS: &str = r#"
    metric_id, segment_id, code, name, is_editable,
    value_type, aggregation, formula, order_index
"#;

impl CatalogRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按代码查询业务板块
    ///
    /// # 返回
    /// - Ok(Some(Segment)): 找到
    /// - Ok(None): 目录中不存在
    pub fn find_segment_by_code(&self, code: SegmentCode) -> RepositoryResult<Option<Segment>> {
        let conn = self.get_conn()?;
        let segment = conn
            .query_row(
                "SELECT segment_id, code, name FROM segment WHERE code = ?1",
                params![code.as_str()],
                map_segment,
            )
            .optional()?;
        Ok(segment)
    }

    /// 查询全部业务板块（按 segment_id）
    pub fn list_segments(&self) -> RepositoryResult<Vec<Segment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT segment_id, code, name FROM segment ORDER BY segment_id")?;
        let segments = stmt
            .query_map([], map_segment)?
            .collect::<SqliteResult<Vec<Segment>>>()?;
        Ok(segments)
    }

    /// 查询板块当前目录快照中的指标（按 order_index）
    pub fn list_metrics_for_segment(&self, segment_id: i64) -> RepositoryResult<Vec<Metric>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM metric WHERE segment_id = ?1 AND is_active = 1 ORDER BY order_index, metric_id",
            METRIC_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let metrics = stmt
            .query_map(params![segment_id], map_metric)?
            .collect::<SqliteResult<Vec<Metric>>>()?;
        Ok(metrics)
    }

    /// 按板块 + 指标代码查询单个指标（仅当前目录快照）
    pub fn find_metric(&self, segment_id: i64, code: &str) -> RepositoryResult<Option<Metric>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM metric WHERE segment_id = ?1 AND code = ?2 AND is_active = 1",
            METRIC_COLUMNS
        );
        let metric = conn
            .query_row(&sql, params![segment_id, code], map_metric)
            .optional()?;
        Ok(metric)
    }

    /// 写入目录种子（按代码 upsert，可重复执行）
    ///
    /// # 返回
    /// - Ok(usize): 写入的指标数
    pub fn seed_catalog(&self, seeds: &[SegmentSeed]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let mut metric_count = 0;

        for seed in seeds {
            tx.execute(
                r#"
                INSERT INTO segment (code, name) VALUES (?1, ?2)
                ON CONFLICT(code) DO UPDATE SET name = excluded.name
                "#,
                params![seed.code.as_str(), seed.name],
            )?;
            let segment_id: i64 = tx.query_row(
                "SELECT segment_id FROM segment WHERE code = ?1",
                params![seed.code.as_str()],
                |row| row.get(0),
            )?;

            for (idx, metric) in seed.metrics.iter().enumerate() {
                metric_count += tx.execute(
                    r#"
                    INSERT INTO metric (
                        segment_id, code, name, is_editable, value_type,
                        aggregation, formula, order_index, is_active
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)
                    ON CONFLICT(segment_id, code) DO UPDATE SET
                        name = excluded.name,
                        is_editable = excluded.is_editable,
                        value_type = excluded.value_type,
                        aggregation = excluded.aggregation,
                        formula = excluded.formula,
                        order_index = excluded.order_index,
                        is_active = 1
                    "#,
                    params![
                        segment_id,
                        metric.code,
                        metric.name,
                        metric.is_editable as i32,
                        metric.value_type.as_str(),
                        metric.aggregation.as_str(),
                        metric.formula.map(|f| f.as_str()),
                        (idx as i32 + 1) * 10,
                    ],
                )?;
            }
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(metric_count)
    }

    /// 将指标移出当前目录快照（历史数值保留）
    ///
    /// # 返回
    /// - Ok(usize): 受影响行数
    pub fn deactivate_metric(&self, segment_id: i64, code: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE metric SET is_active = 0 WHERE segment_id = ?1 AND code = ?2",
            params![segment_id, code],
        )?;
        Ok(affected)
    }
}
