// ==========================================
// 物流运营报表系统 - 月度计划仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: monthly_plan / monthly_plan_metric 表的读写
// 说明: 整年结转序列写入在单事务内完成（12 行全成或全不成）
// ==========================================

use crate::domain::daily_value::round2;
use crate::domain::period::ReportPeriod;
use crate::domain::plan::{LaneBalances, MonthlyPlan, MonthlyPlanMetric, PlanSeed, PlanSeriesRow};
use crate::domain::types::{PlanMetricCode, CARRY_MODE_CLASSIC};
use crate::repository::catalog_repo::parse_column;
use crate::repository::error::{RepositoryError, RepositoryResult};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn now_str() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn map_plan(row: &Row<'_>) -> SqliteResult<MonthlyPlan> {
    Ok(MonthlyPlan {
        plan_id: row.get(0)?,
        segment_id: row.get(1)?,
        year: row.get(2)?,
        month: row.get(3)?,
        seed_json: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_plan_metric(row: &Row<'_>) -> SqliteResult<MonthlyPlanMetric> {
    Ok(MonthlyPlanMetric {
        plan_id: row.get(0)?,
        plan_metric_code: parse_column::<PlanMetricCode>(row, 1)?,
        base_plan: row.get(2)?,
        carry_plan: row.get(3)?,
        carry_mode: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const PLAN_COLUMNS: &str = "plan_id, segment_id, year, month, seed_json, created_at, updated_at";
const PLAN_METRIC_COLUMNS: &str =
    "plan_id, plan_metric_code, base_plan, carry_plan, carry_mode, updated_at";

/// 在给定连接（或事务）上查找计划
fn find_plan_on(
    conn: &Connection,
    segment_id: i64,
    year: i32,
    month: u32,
) -> SqliteResult<Option<MonthlyPlan>> {
    let sql = format!(
        "SELECT {} FROM monthly_plan WHERE segment_id = ?1 AND year = ?2 AND month = ?3",
        PLAN_COLUMNS
    );
    conn.query_row(&sql, params![segment_id, year, month], map_plan)
        .optional()
}

/// 在给定连接（或事务）上获取或创建计划
fn get_or_create_plan_on(
    conn: &Connection,
    segment_id: i64,
    year: i32,
    month: u32,
) -> SqliteResult<MonthlyPlan> {
    if let Some(plan) = find_plan_on(conn, segment_id, year, month)? {
        return Ok(plan);
    }

    let now = now_str();
    let plan = MonthlyPlan {
        plan_id: Uuid::new_v4().to_string(),
        segment_id,
        year,
        month,
        seed_json: None,
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        r#"
        INSERT INTO monthly_plan (plan_id, segment_id, year, month, seed_json, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)
        "#,
        params![
            plan.plan_id,
            plan.segment_id,
            plan.year,
            plan.month,
            plan.created_at,
            plan.updated_at
        ],
    )?;
    Ok(plan)
}

/// 在给定连接（或事务）上读取整年基础计划（缺失月份为 0）
fn year_base_plans_on(
    conn: &Connection,
    segment_id: i64,
    year: i32,
    code: PlanMetricCode,
) -> SqliteResult<[f64; 12]> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.month, pm.base_plan
        FROM monthly_plan_metric pm
        INNER JOIN monthly_plan p ON p.plan_id = pm.plan_id
        WHERE p.segment_id = ?1 AND p.year = ?2 AND pm.plan_metric_code = ?3
        "#,
    )?;
    let rows = stmt
        .query_map(params![segment_id, year, code.as_str()], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<SqliteResult<Vec<(u32, f64)>>>()?;

    let mut plans = [0.0; 12];
    for (month, base_plan) in rows {
        if (1..=12).contains(&month) {
            plans[month as usize - 1] = base_plan;
        }
    }
    Ok(plans)
}

/// 写入一行计划指标
///
/// write_base = false 时已有行只更新结转计划，基础计划保持库内值
fn upsert_series_row_on(
    conn: &Connection,
    plan_id: &str,
    code: PlanMetricCode,
    row: &PlanSeriesRow,
    write_base: bool,
    now: &str,
) -> SqliteResult<usize> {
    let sql = if write_base {
        r#"
        INSERT INTO monthly_plan_metric
            (plan_id, plan_metric_code, base_plan, carry_plan, carry_mode, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(plan_id, plan_metric_code) DO UPDATE SET
            base_plan = excluded.base_plan,
            carry_plan = excluded.carry_plan,
            carry_mode = excluded.carry_mode,
            updated_at = excluded.updated_at
        "#
    } else {
        r#"
        INSERT INTO monthly_plan_metric
            (plan_id, plan_metric_code, base_plan, carry_plan, carry_mode, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(plan_id, plan_metric_code) DO UPDATE SET
            carry_plan = excluded.carry_plan,
            carry_mode = excluded.carry_mode,
            updated_at = excluded.updated_at
        "#
    };
    conn.execute(
        sql,
        params![
            plan_id,
            code.as_str(),
            round2(row.base_plan),
            round2(row.carry_plan),
            CARRY_MODE_CLASSIC,
            now
        ],
    )
}

// ==========================================
// MonthlyPlanRepository - 月度计划仓储
// ==========================================
pub struct MonthlyPlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MonthlyPlanRepository {
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

    /// 查询月度计划（不存在时返回 None，不创建）
    pub fn find_plan(
        &self,
        segment_id: i64,
        year: i32,
        month: u32,
    ) -> RepositoryResult<Option<MonthlyPlan>> {
        let conn = self.get_conn()?;
        Ok(find_plan_on(&conn, segment_id, year, month)?)
    }

    /// 获取或创建月度计划
    pub fn get_or_create_plan(
        &self,
        segment_id: i64,
        year: i32,
        month: u32,
    ) -> RepositoryResult<MonthlyPlan> {
        let conn = self.get_conn()?;
        Ok(get_or_create_plan_on(&conn, segment_id, year, month)?)
    }

    /// 获取或创建月度计划指标（新建时 base_plan = 0，carry_plan 为空）
    pub fn get_or_create_plan_metric(
        &self,
        plan_id: &str,
        code: PlanMetricCode,
    ) -> RepositoryResult<MonthlyPlanMetric> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO monthly_plan_metric
                (plan_id, plan_metric_code, base_plan, carry_plan, carry_mode, updated_at)
            VALUES (?1, ?2, 0, NULL, ?3, ?4)
            "#,
            params![plan_id, code.as_str(), CARRY_MODE_CLASSIC, now_str()],
        )?;

        let sql = format!(
            "SELECT {} FROM monthly_plan_metric WHERE plan_id = ?1 AND plan_metric_code = ?2",
            PLAN_METRIC_COLUMNS
        );
        let metric = conn.query_row(&sql, params![plan_id, code.as_str()], map_plan_metric)?;
        Ok(metric)
    }

    /// 查询某板块某月的全部计划指标（计划不存在时返回空列表）
    pub fn find_plan_metrics(
        &self,
        segment_id: i64,
        year: i32,
        month: u32,
    ) -> RepositoryResult<Vec<MonthlyPlanMetric>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT pm.plan_id, pm.plan_metric_code, pm.base_plan, pm.carry_plan,
                   pm.carry_mode, pm.updated_at
            FROM monthly_plan_metric pm
            INNER JOIN monthly_plan p ON p.plan_id = pm.plan_id
            WHERE p.segment_id = ?1 AND p.year = ?2 AND p.month = ?3
            ORDER BY pm.plan_metric_code
            "#,
        )?;
        let metrics = stmt
            .query_map(params![segment_id, year, month], map_plan_metric)?
            .collect::<SqliteResult<Vec<MonthlyPlanMetric>>>()?;
        Ok(metrics)
    }

    /// 查询一年 12 个月的基础计划（缺失月份为 0）
    pub fn find_year_base_plans(
        &self,
        segment_id: i64,
        year: i32,
        code: PlanMetricCode,
    ) -> RepositoryResult<[f64; 12]> {
        let conn = self.get_conn()?;
        Ok(year_base_plans_on(&conn, segment_id, year, code)?)
    }

    /// 查询 [from, to] 月份区间内带待发期初种子的计划
    pub fn find_waiting_seeds(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeMap<(i32, u32), LaneBalances>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM monthly_plan
            WHERE segment_id = ?1
              AND seed_json IS NOT NULL
              AND (year * 12 + month - 1) BETWEEN ?2 AND ?3
            "#,
            PLAN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let plans = stmt
            .query_map(params![segment_id, from.ordinal(), to.ordinal()], map_plan)?
            .collect::<SqliteResult<Vec<MonthlyPlan>>>()?;

        Ok(plans
            .into_iter()
            .filter_map(|p| p.waiting_seed().map(|seed| ((p.year, p.month), seed)))
            .collect())
    }

    /// 写入待发期初余额种子（计划不存在时创建）
    pub fn set_waiting_seed(
        &self,
        segment_id: i64,
        year: i32,
        month: u32,
        seed: &LaneBalances,
    ) -> RepositoryResult<MonthlyPlan> {
        let seed = PlanSeed {
            waiting_start: Some(*seed),
        };
        let seed_json = serde_json::to_string(&seed).context("序列化待发期初种子失败")?;

        let conn = self.get_conn()?;
        let mut plan = get_or_create_plan_on(&conn, segment_id, year, month)?;
        plan.updated_at = now_str();
        conn.execute(
            "UPDATE monthly_plan SET seed_json = ?1, updated_at = ?2 WHERE plan_id = ?3",
            params![seed_json, plan.updated_at, plan.plan_id],
        )?;
        plan.seed_json = Some(seed_json);
        Ok(plan)
    }

    /// 整年写入基础计划 + 结转计划（单事务，按 1→12 月顺序）
    ///
    /// # 返回
    /// - Ok(usize): 写入的计划指标行数
    pub fn persist_year_series(
        &self,
        segment_id: i64,
        year: i32,
        code: PlanMetricCode,
        rows: &[PlanSeriesRow],
    ) -> RepositoryResult<usize> {
        let mut ordered: Vec<PlanSeriesRow> = rows.to_vec();
        ordered.sort_by_key(|r| r.month);

        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let now = now_str();
        let mut count = 0;

        for row in &ordered {
            let plan = get_or_create_plan_on(&tx, segment_id, year, row.month)?;
            count += upsert_series_row_on(&tx, &plan.plan_id, code, row, true, &now)?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(count)
    }

    /// 整年结转重算写回（读取 → 替换单月 → 计算 → 写回 在同一写事务内）
    ///
    /// - 事务以 IMMEDIATE 开启，并在整个过程中持有连接
    /// - replace 指定的月份写入新的基础计划，其余月份只更新结转计划
    /// - fold 接收本事务内读到的 12 个月基础计划，返回待写入的序列
    ///
    /// # 返回
    /// - Ok((基础计划, 写入行数))
    pub fn recompute_year_series<F>(
        &self,
        segment_id: i64,
        year: i32,
        code: PlanMetricCode,
        replace: Option<(u32, f64)>,
        fold: F,
    ) -> RepositoryResult<([f64; 12], usize)>
    where
        F: FnOnce(&[f64; 12]) -> Vec<PlanSeriesRow>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;

        let mut base_plans = year_base_plans_on(&tx, segment_id, year, code)?;
        let edited_month = match replace {
            Some((month, value)) if (1..=12).contains(&month) => {
                base_plans[month as usize - 1] = round2(value);
                Some(month)
            }
            Some((month, _)) => {
                return Err(RepositoryError::FieldValueError {
                    field: "month".to_string(),
                    message: format!("月份超出范围: {}", month),
                })
            }
            None => None,
        };

        let mut rows = fold(&base_plans);
        rows.sort_by_key(|r| r.month);

        let now = now_str();
        let mut count = 0;
        for row in &rows {
            let plan = get_or_create_plan_on(&tx, segment_id, year, row.month)?;
            let write_base = edited_month == Some(row.month);
            count += upsert_series_row_on(&tx, &plan.plan_id, code, row, write_base, &now)?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok((base_plans, count))
    }
}
