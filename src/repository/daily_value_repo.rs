// ==========================================
// 物流运营报表系统 - 逐日数值仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: daily_value 表的读写
// 说明: value 为 NULL 表示“无数据”，与 0 严格区分
// ==========================================

use crate::domain::daily_value::{round2, DailyValue};
use crate::domain::period::ReportPeriod;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// ==========================================
// DailyValueRepository - 逐日数值仓储
// ==========================================
pub struct DailyValueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DailyValueRepository {
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

    /// 查询板块在日期区间内的全部逐日数值（含已停用指标的历史数据）
    ///
    /// # 参数
    /// - segment_id: 板块 ID
    /// - date_from / date_to: 闭区间
    pub fn find_by_segment_and_range(
        &self,
        segment_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<DailyValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT dv.value_date, dv.metric_id, dv.value
            FROM daily_value dv
            INNER JOIN metric m ON m.metric_id = dv.metric_id
            WHERE m.segment_id = ?1
              AND dv.value_date >= ?2
              AND dv.value_date <= ?3
            ORDER BY dv.value_date, dv.metric_id
            "#,
        )?;

        let values = stmt
            .query_map(params![segment_id, date_from, date_to], |row| {
                Ok(DailyValue {
                    value_date: row.get(0)?,
                    metric_id: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<DailyValue>>>()?;

        Ok(values)
    }

    /// 写入单个逐日数值（存在则覆盖），数值按 2 位小数持久化
    pub fn upsert_value(
        &self,
        value_date: NaiveDate,
        metric_id: i64,
        value: Option<f64>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO daily_value (value_date, metric_id, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(value_date, metric_id) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![value_date, metric_id, value.map(round2)],
        )?;
        Ok(())
    }

    /// 批量写入（单事务）
    ///
    /// # 返回
    /// - Ok(usize): 写入行数
    pub fn upsert_batch(&self, values: &[DailyValue]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO daily_value (value_date, metric_id, value, updated_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(value_date, metric_id) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for v in values {
                count += stmt.execute(params![v.value_date, v.metric_id, v.value.map(round2)])?;
            }
        }
        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(count)
    }

    /// 查询板块在 [from, to] 月份区间内“有数据”的月份
    ///
    /// 只有非 NULL 数值才算有数据。
    pub fn months_with_data(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeSet<(i32, u32)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT CAST(substr(dv.value_date, 1, 4) AS INTEGER),
                            CAST(substr(dv.value_date, 6, 2) AS INTEGER)
            FROM daily_value dv
            INNER JOIN metric m ON m.metric_id = dv.metric_id
            WHERE m.segment_id = ?1
              AND dv.value IS NOT NULL
              AND dv.value_date >= ?2
              AND dv.value_date <= ?3
            "#,
        )?;

        let months = stmt
            .query_map(params![segment_id, from.first_day(), to.last_day()], |row| {
                Ok((row.get::<_, i32>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<SqliteResult<BTreeSet<(i32, u32)>>>()?;

        Ok(months)
    }
}
