// ==========================================
// 物流运营报表系统 - 板块月报构建引擎
// ==========================================
// 职责: 目录 + 逐日数值 + 公式行 + 待发余额 → 月度网格 + 月度合计
// 流程:
// 1) 截止日夹取到本月，计算已完成天数
// 2) 读取本月全部逐日数值，按指标 + 日分桶
// 3) 汽运发运板块：解析月初余额并填充待发通道行
// 4) 计算公式行（待发合计依赖通道行，故在 3 之后）
// 5) 按汇总规则计算月度合计
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::instrument;

use crate::domain::period::ReportPeriod;
use crate::domain::report::{GridRow, PlanSnapshot, SegmentReport};
use crate::domain::types::{SegmentCode, SegmentKind};
use crate::engine::formula::FormulaRowEvaluator;
use crate::engine::repositories::ReportDataSource;
use crate::engine::series::{bucket_values, month_total};
use crate::engine::waiting_balance::WaitingBalanceResolver;
use crate::perf::PerfGuard;
use crate::repository::{RepositoryError, RepositoryResult};

// ==========================================
// SegmentReportBuilder - 板块月报构建引擎
// ==========================================
pub struct SegmentReportBuilder {
    source: Arc<dyn ReportDataSource>,
    evaluator: FormulaRowEvaluator,
    resolver: WaitingBalanceResolver,
}

impl SegmentReportBuilder {
    pub fn new(source: Arc<dyn ReportDataSource>, resolver: WaitingBalanceResolver) -> Self {
        Self {
            source,
            evaluator: FormulaRowEvaluator::new(),
            resolver,
        }
    }

    pub fn source(&self) -> &Arc<dyn ReportDataSource> {
        &self.source
    }

    /// 构建板块月报
    ///
    /// # 参数
    /// - code: 板块代码
    /// - period: 报表期间
    /// - as_of: 截止日（缺省为今天），会被夹取到本月范围内
    ///
    /// # 错误
    /// - 板块不在目录中 → RepositoryError::NotFound
    #[instrument(skip(self), fields(segment = %code, period = %period))]
    pub fn build(
        &self,
        code: SegmentCode,
        period: ReportPeriod,
        as_of: Option<NaiveDate>,
    ) -> RepositoryResult<SegmentReport> {
        let _perf = PerfGuard::new("build_segment_report").with_context(format!("{} {}", code, period));

        let segment = self
            .source
            .find_segment(code)?
            .ok_or_else(|| RepositoryError::not_found("Segment", code))?;

        let as_of = period.clamp_date(as_of.unwrap_or_else(|| chrono::Local::now().date_naive()));
        let completed_days = period.completed_days(as_of);
        let days = period.days_in_month();

        let metrics = self.source.list_metrics(segment.segment_id)?;
        let values = self
            .source
            .load_values(segment.segment_id, period.first_day(), period.last_day())?;
        let mut series = bucket_values(period, &metrics, &values);

        let kind = code.kind();
        if kind == SegmentKind::TruckDispatch {
            let start = self
                .resolver
                .resolve_start(self.source.as_ref(), segment.segment_id, period, &metrics)?;
            tracing::debug!(source = ?start.source, months_applied = start.months_applied, "待发月初余额");
            self.resolver
                .fill_month(&start.balances, &metrics, &mut series, days);
        }

        self.evaluator.evaluate(kind, &metrics, &mut series, days);

        let grid: Vec<GridRow> = metrics
            .iter()
            .map(|m| {
                let day_values = series.remove(&m.code).unwrap_or_else(|| vec![None; days]);
                GridRow {
                    metric_code: m.code.clone(),
                    metric_name: m.name.clone(),
                    value_type: m.value_type,
                    aggregation: m.aggregation,
                    is_editable: m.is_editable,
                    month_total: month_total(m, &day_values),
                    day_values,
                }
            })
            .collect();

        let plans = self
            .source
            .find_plan_metrics(segment.segment_id, period)?
            .into_iter()
            .map(|pm| PlanSnapshot {
                plan_metric_code: pm.plan_metric_code,
                base_plan: pm.base_plan,
                carry_plan: pm.carry_plan,
            })
            .collect();

        Ok(SegmentReport {
            segment_code: code,
            segment_name: segment.name,
            year: period.year(),
            month: period.month(),
            as_of,
            days_in_month: days,
            completed_days,
            grid,
            plans,
        })
    }
}
