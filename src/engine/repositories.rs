// ==========================================
// 物流运营报表系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合报表引擎所需的只读数据访问
// 说明: 引擎只依赖 ReportDataSource trait，测试时可替换为内存实现
// ==========================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::catalog::{Metric, Segment};
use crate::domain::daily_value::DailyValue;
use crate::domain::period::ReportPeriod;
use crate::domain::plan::{LaneBalances, MonthlyPlanMetric};
use crate::domain::types::{PlanMetricCode, SegmentCode};
use crate::repository::{
    CatalogRepository, DailyValueRepository, MonthlyPlanRepository, RepositoryResult,
};

/// 报表引擎数据源（只读）
///
/// 读路径从不创建月度计划：缺失的计划按 0 处理。
pub trait ReportDataSource: Send + Sync {
    fn find_segment(&self, code: SegmentCode) -> RepositoryResult<Option<Segment>>;

    /// 当前目录快照中的指标（按 order_index）
    fn list_metrics(&self, segment_id: i64) -> RepositoryResult<Vec<Metric>>;

    /// 日期闭区间内的逐日数值（可能包含已移出目录的指标）
    fn load_values(
        &self,
        segment_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<DailyValue>>;

    /// [from, to] 内有非空数值的月份
    fn months_with_data(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeSet<(i32, u32)>>;

    /// [from, to] 内设置了待发期初种子的月份
    fn waiting_seeds(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeMap<(i32, u32), LaneBalances>>;

    fn find_plan_metrics(
        &self,
        segment_id: i64,
        period: ReportPeriod,
    ) -> RepositoryResult<Vec<MonthlyPlanMetric>>;

    fn find_year_base_plans(
        &self,
        segment_id: i64,
        year: i32,
        code: PlanMetricCode,
    ) -> RepositoryResult<[f64; 12]>;
}

/// 报表引擎仓储集合
///
/// # 包含的仓储
/// - `catalog_repo`: 板块 / 指标目录
/// - `daily_value_repo`: 逐日数值
/// - `plan_repo`: 月度计划
#[derive(Clone)]
pub struct ReportRepositories {
    pub catalog_repo: Arc<CatalogRepository>,
    pub daily_value_repo: Arc<DailyValueRepository>,
    pub plan_repo: Arc<MonthlyPlanRepository>,
}

impl ReportRepositories {
    pub fn new(
        catalog_repo: Arc<CatalogRepository>,
        daily_value_repo: Arc<DailyValueRepository>,
        plan_repo: Arc<MonthlyPlanRepository>,
    ) -> Self {
        Self {
            catalog_repo,
            daily_value_repo,
            plan_repo,
        }
    }
}

impl ReportDataSource for ReportRepositories {
    fn find_segment(&self, code: SegmentCode) -> RepositoryResult<Option<Segment>> {
        self.catalog_repo.find_segment_by_code(code)
    }

    fn list_metrics(&self, segment_id: i64) -> RepositoryResult<Vec<Metric>> {
        self.catalog_repo.list_metrics_for_segment(segment_id)
    }

    fn load_values(
        &self,
        segment_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<DailyValue>> {
        self.daily_value_repo
            .find_by_segment_and_range(segment_id, date_from, date_to)
    }

    fn months_with_data(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeSet<(i32, u32)>> {
        self.daily_value_repo.months_with_data(segment_id, from, to)
    }

    fn waiting_seeds(
        &self,
        segment_id: i64,
        from: ReportPeriod,
        to: ReportPeriod,
    ) -> RepositoryResult<BTreeMap<(i32, u32), LaneBalances>> {
        self.plan_repo.find_waiting_seeds(segment_id, from, to)
    }

    fn find_plan_metrics(
        &self,
        segment_id: i64,
        period: ReportPeriod,
    ) -> RepositoryResult<Vec<MonthlyPlanMetric>> {
        self.plan_repo
            .find_plan_metrics(segment_id, period.year(), period.month())
    }

    fn find_year_base_plans(
        &self,
        segment_id: i64,
        year: i32,
        code: PlanMetricCode,
    ) -> RepositoryResult<[f64; 12]> {
        self.plan_repo.find_year_base_plans(segment_id, year, code)
    }
}
