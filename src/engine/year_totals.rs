// ==========================================
// 物流运营报表系统 - 年度合计聚合引擎
// ==========================================
// 职责: 按配对表逐月构建板块月报 → 提取月度事实 → 经典结转 → 年度表
// 说明:
// - 12 个月的月报构建互不依赖，可并发（见 aggregate_concurrent）
// - 年度结转计划列 = 年度基础计划之和（不是复利结转值）
// - 仅事实行的计划 / 结转 / 完成率均为 0
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::instrument;

use crate::config::report_config::PlanPairing;
use crate::domain::period::ReportPeriod;
use crate::domain::report::{SegmentReport, YearMonthCell, YearTotalsRow};
use crate::domain::types::SegmentCode;
use crate::engine::carry_over::{CarryOverMonth, ClassicCarryOverCalculator};
use crate::engine::dashboard::completion_pct;
use crate::engine::report_builder::SegmentReportBuilder;
use crate::repository::{RepositoryError, RepositoryResult};

/// 从一年 12 份月报中提取配对行的月度事实
pub fn collect_facts(pairing: &PlanPairing, reports: &[SegmentReport]) -> [f64; 12] {
    let mut facts = [0.0; 12];
    for report in reports {
        let idx = report.month as usize - 1;
        if idx < 12 {
            facts[idx] = pairing
                .fact_metrics
                .iter()
                .map(|code| report.month_total(code).unwrap_or(0.0))
                .sum();
        }
    }
    facts
}

/// 组装年度合计行
pub fn build_row(pairing: &PlanPairing, base_plans: &[f64; 12], facts: &[f64; 12]) -> YearTotalsRow {
    let plan_tracked = pairing.is_plan_tracked();
    let carry: Vec<CarryOverMonth> = if plan_tracked {
        ClassicCarryOverCalculator::new().calculate(base_plans, facts)
    } else {
        Vec::new()
    };

    let months: Vec<YearMonthCell> = (0..12)
        .map(|idx| match carry.get(idx) {
            Some(c) => YearMonthCell {
                month: c.month,
                base_plan: c.base_plan,
                carry_plan: c.carry_plan,
                fact: c.fact,
                completion_pct: c.completion_pct,
            },
            None => YearMonthCell {
                month: idx as u32 + 1,
                base_plan: 0.0,
                carry_plan: 0.0,
                fact: facts[idx],
                completion_pct: 0.0,
            },
        })
        .collect();

    let yearly_base_plan: f64 = months.iter().map(|m| m.base_plan).sum();
    let yearly_fact: f64 = months.iter().map(|m| m.fact).sum();
    let yearly_carry_plan = yearly_base_plan;

    YearTotalsRow {
        row_key: pairing.row_key.clone(),
        title: pairing.title.clone(),
        segment_code: pairing.segment_code,
        plan_metric_code: pairing.plan_metric,
        plan_tracked,
        months,
        yearly_base_plan,
        yearly_carry_plan,
        yearly_fact,
        yearly_completion_pct: if plan_tracked {
            completion_pct(yearly_fact, yearly_carry_plan)
        } else {
            0.0
        },
    }
}

/// 配对表涉及的板块（去重，保持出现顺序）
fn segments_of(pairings: &[PlanPairing]) -> Vec<SegmentCode> {
    let mut out: Vec<SegmentCode> = Vec::new();
    for p in pairings {
        if !out.contains(&p.segment_code) {
            out.push(p.segment_code);
        }
    }
    out
}

// ==========================================
// YearTotalsAggregator - 年度合计聚合引擎
// ==========================================
pub struct YearTotalsAggregator {
    builder: Arc<SegmentReportBuilder>,
}

impl YearTotalsAggregator {
    pub fn new(builder: Arc<SegmentReportBuilder>) -> Self {
        Self { builder }
    }

    /// 构建某板块一年 12 份月报（截止日取各月月末）
    pub fn build_year_reports(
        &self,
        code: SegmentCode,
        year: i32,
    ) -> RepositoryResult<Vec<SegmentReport>> {
        ReportPeriod::months_of_year(year)
            .map(|period| self.builder.build(code, period, Some(period.last_day())))
            .collect()
    }

    /// 单个配对行一年 12 个月的事实
    pub fn year_facts(&self, pairing: &PlanPairing, year: i32) -> RepositoryResult<[f64; 12]> {
        let reports = self.build_year_reports(pairing.segment_code, year)?;
        Ok(collect_facts(pairing, &reports))
    }

    /// 读取配对行一年 12 个月的基础计划（仅事实行全 0）
    fn base_plans(&self, pairing: &PlanPairing, year: i32) -> RepositoryResult<[f64; 12]> {
        let Some(code) = pairing.plan_metric else {
            return Ok([0.0; 12]);
        };
        let source = self.builder.source();
        let segment = source
            .find_segment(pairing.segment_code)?
            .ok_or_else(|| RepositoryError::not_found("Segment", pairing.segment_code))?;
        source.find_year_base_plans(segment.segment_id, year, code)
    }

    fn assemble(
        &self,
        pairings: &[PlanPairing],
        year: i32,
        reports: &BTreeMap<SegmentCode, Vec<SegmentReport>>,
    ) -> RepositoryResult<Vec<YearTotalsRow>> {
        pairings
            .iter()
            .map(|pairing| {
                let facts = reports
                    .get(&pairing.segment_code)
                    .map(|r| collect_facts(pairing, r))
                    .unwrap_or([0.0; 12]);
                let base = self.base_plans(pairing, year)?;
                Ok(build_row(pairing, &base, &facts))
            })
            .collect()
    }

    /// 同步聚合：每个板块顺序构建 12 份月报
    #[instrument(skip(self, pairings), fields(year = year, rows = pairings.len()))]
    pub fn aggregate(&self, pairings: &[PlanPairing], year: i32) -> RepositoryResult<Vec<YearTotalsRow>> {
        let mut reports = BTreeMap::new();
        for code in segments_of(pairings) {
            reports.insert(code, self.build_year_reports(code, year)?);
        }
        self.assemble(pairings, year, &reports)
    }

    /// 并发聚合：全部（板块, 月份）月报在阻塞线程池上并发构建
    ///
    /// 只读，不产生任何写入，调用方可安全地在超时后丢弃。
    pub async fn aggregate_concurrent(
        self: Arc<Self>,
        pairings: Vec<PlanPairing>,
        year: i32,
    ) -> RepositoryResult<Vec<YearTotalsRow>> {
        let tasks = segments_of(&pairings)
            .into_iter()
            .flat_map(|code| ReportPeriod::months_of_year(year).map(move |p| (code, p)))
            .map(|(code, period)| {
                let builder = Arc::clone(&self.builder);
                tokio::task::spawn_blocking(move || {
                    builder
                        .build(code, period, Some(period.last_day()))
                        .map(|report| (code, report))
                })
            });

        let mut reports: BTreeMap<SegmentCode, Vec<SegmentReport>> = BTreeMap::new();
        for joined in join_all(tasks).await {
            let (code, report) = joined
                .map_err(|e| RepositoryError::InternalError(format!("月报构建任务失败: {}", e)))??;
            reports.entry(code).or_default().push(report);
        }

        let this = Arc::clone(&self);
        tokio::task::spawn_blocking(move || this.assemble(&pairings, year, &reports))
            .await
            .map_err(|e| RepositoryError::InternalError(format!("年度合计组装任务失败: {}", e)))?
    }
}
