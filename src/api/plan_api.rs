// ==========================================
// 物流运营报表系统 - 计划 API
// ==========================================
// 职责: 年度合计查询、基础计划修改、结转重算、待发期初种子
// 红线:
// - 修改任一月份基础计划 → 整年 12 个月结转计划重算并单事务写回
// - 月度事实在获取写锁之前计算完毕
// - 年度合计（含带截止时间的并发版本）只读
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::report_api::parse_segment_code;
use crate::api::validator::{validate_plan_value, PeriodValidator};
use crate::config::{PlanPairing, ReportConfig};
use crate::domain::plan::{LaneBalances, MonthlyPlan};
use crate::domain::report::YearTotalsRow;
use crate::domain::types::{PlanMetricCode, SegmentCode, SegmentKind};
use crate::engine::carry_over::ClassicCarryOverCalculator;
use crate::engine::year_totals::{build_row, YearTotalsAggregator};
use crate::perf::PerfGuard;
use crate::repository::{CatalogRepository, MonthlyPlanRepository, RepositoryError};

// ==========================================
// PlanApi - 计划 API
// ==========================================
pub struct PlanApi {
    catalog_repo: Arc<CatalogRepository>,
    plan_repo: Arc<MonthlyPlanRepository>,
    aggregator: Arc<YearTotalsAggregator>,
    calculator: ClassicCarryOverCalculator,
    config: Arc<ReportConfig>,
    validator: PeriodValidator,
}

impl PlanApi {
    pub fn new(
        catalog_repo: Arc<CatalogRepository>,
        plan_repo: Arc<MonthlyPlanRepository>,
        aggregator: Arc<YearTotalsAggregator>,
        config: Arc<ReportConfig>,
    ) -> Self {
        let validator = PeriodValidator::from_config(&config);
        Self {
            catalog_repo,
            plan_repo,
            aggregator,
            calculator: ClassicCarryOverCalculator::new(),
            config,
            validator,
        }
    }

    /// 年度合计（同步，逐板块顺序构建月报）
    pub fn get_year_totals(&self, year: i32) -> ApiResult<Vec<YearTotalsRow>> {
        self.validator.validate_year(year)?;
        let _perf = PerfGuard::new("get_year_totals").with_context(year.to_string());
        Ok(self.aggregator.aggregate(&self.config.pairings, year)?)
    }

    /// 年度合计（并发构建月报，带整体截止时间）
    ///
    /// # 返回
    /// - Err(ApiError::DeadlineExceeded): 超时；读路径无写入，直接放弃即可
    pub async fn get_year_totals_within(
        self: Arc<Self>,
        year: i32,
        deadline: Duration,
    ) -> ApiResult<Vec<YearTotalsRow>> {
        self.validator.validate_year(year)?;
        let work = Arc::clone(&self.aggregator).aggregate_concurrent(self.config.pairings.clone(), year);

        match tokio::time::timeout(deadline, work).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(year, deadline_ms = deadline.as_millis() as u64, "年度合计超出截止时间");
                Err(ApiError::DeadlineExceeded(format!(
                    "年度合计{}未能在{}ms内完成",
                    year,
                    deadline.as_millis()
                )))
            }
        }
    }

    /// 修改某月基础计划，并重算写回整年结转计划
    ///
    /// # 返回
    /// 该配对行重算后的年度合计行
    #[instrument(skip(self), fields(year = year, month = month, segment = %segment_code, plan_metric = %plan_metric_code))]
    pub fn update_base_plan(
        &self,
        year: i32,
        month: u32,
        segment_code: &str,
        plan_metric_code: &str,
        base_plan: f64,
    ) -> ApiResult<YearTotalsRow> {
        let period = self.validator.validate_period(year, month)?;
        validate_plan_value(base_plan)?;
        let pairing = self.resolve_pairing(segment_code, plan_metric_code)?;

        self.recalculate(pairing, period.year(), Some((period.month(), base_plan)))
    }

    /// 不修改基础计划，仅重算并写回整年结转计划
    #[instrument(skip(self), fields(year = year, segment = %segment_code, plan_metric = %plan_metric_code))]
    pub fn recalculate_carry(
        &self,
        year: i32,
        segment_code: &str,
        plan_metric_code: &str,
    ) -> ApiResult<YearTotalsRow> {
        self.validator.validate_year(year)?;
        let pairing = self.resolve_pairing(segment_code, plan_metric_code)?;
        self.recalculate(pairing, year, None)
    }

    /// 设置汽运发运某月的待发期初余额种子（该月成为待发余额回溯的锚点）
    pub fn set_waiting_seed(
        &self,
        year: i32,
        month: u32,
        segment_code: &str,
        seed: LaneBalances,
    ) -> ApiResult<MonthlyPlan> {
        let period = self.validator.validate_period(year, month)?;
        let code = parse_segment_code(segment_code)?;
        if code.kind() != SegmentKind::TruckDispatch {
            return Err(ApiError::InvalidInput(format!("板块{}没有待发余额指标", code)));
        }
        if [seed.truck, seed.container_in_truck, seed.curtain]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(ApiError::InvalidInput("待发期初余额必须为有限数".to_string()));
        }

        let segment_id = self.segment_id(code)?;
        let plan = self
            .plan_repo
            .set_waiting_seed(segment_id, period.year(), period.month(), &seed)?;
        tracing::info!(period = %period, plan_id = %plan.plan_id, "待发期初余额种子已写入");
        Ok(plan)
    }

    // ==========================================
    // 内部方法
    // ==========================================

    fn resolve_pairing(&self, segment_code: &str, plan_metric_code: &str) -> ApiResult<&PlanPairing> {
        let code = parse_segment_code(segment_code)?;
        let plan_metric = plan_metric_code
            .parse::<PlanMetricCode>()
            .map_err(|e| ApiError::NotFound(e.to_string()))?;

        self.config.find_pairing(code, plan_metric).ok_or_else(|| {
            ApiError::NotFound(format!("板块{}未配置计划指标{}", code, plan_metric))
        })
    }

    fn segment_id(&self, code: SegmentCode) -> ApiResult<i64> {
        let segment = self
            .catalog_repo
            .find_segment_by_code(code)?
            .ok_or_else(|| RepositoryError::not_found("Segment", code))?;
        Ok(segment.segment_id)
    }

    /// 整年结转重算
    ///
    /// 1) 构建 12 份月报得到月度事实（不持有写事务）
    /// 2) 写事务内读取 12 个月基础计划，按需替换单月
    /// 3) 经典结转计算
    /// 4) 同一事务内写回（1→12 月），并发修改不同月份互不覆盖
    fn recalculate(
        &self,
        pairing: &PlanPairing,
        year: i32,
        replace: Option<(u32, f64)>,
    ) -> ApiResult<YearTotalsRow> {
        let plan_metric = pairing.plan_metric.ok_or_else(|| {
            ApiError::InvalidInput(format!("配对行{}没有计划指标", pairing.row_key))
        })?;
        let _perf = PerfGuard::new("recalculate_carry").with_context(format!("{} {}", pairing.row_key, year));

        let segment_id = self.segment_id(pairing.segment_code)?;
        let facts = self.aggregator.year_facts(pairing, year)?;

        let calculator = &self.calculator;
        let (base_plans, written) =
            self.plan_repo
                .recompute_year_series(segment_id, year, plan_metric, replace, |base_plans| {
                    calculator
                        .calculate(base_plans, &facts)
                        .iter()
                        .map(|m| m.to_series_row())
                        .collect()
                })?;

        tracing::info!(
            row_key = %pairing.row_key,
            year,
            written,
            "整年结转计划已重算并写回"
        );
        Ok(build_row(pairing, &base_plans, &facts))
    }
}
