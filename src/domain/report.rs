// ==========================================
// 物流运营报表系统 - 报表输出模型
// ==========================================
// 职责: 月度网格 / 驾驶舱 KPI / 跨板块汇总 / 年度合计 的输出结构
// 红线: “无数据”序列化为 null，不得提前折算为 0
// ==========================================

use crate::domain::types::{Aggregation, PlanMetricCode, SegmentCode, ValueType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// 月度网格
// ==========================================

/// 网格行：一个指标的逐日数据 + 月度合计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub metric_code: String,
    pub metric_name: String,
    pub value_type: ValueType,
    pub aggregation: Aggregation,
    pub is_editable: bool,
    pub day_values: Vec<Option<f64>>,
    pub month_total: Option<f64>,
}

/// 计划指标快照（驾驶舱输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan_metric_code: PlanMetricCode,
    pub base_plan: f64,
    pub carry_plan: Option<f64>,
}

impl PlanSnapshot {
    pub fn effective_plan(&self) -> f64 {
        self.carry_plan.unwrap_or(self.base_plan)
    }
}

/// 板块月度报表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub segment_code: SegmentCode,
    pub segment_name: String,
    pub year: i32,
    pub month: u32,
    pub as_of: NaiveDate,
    pub days_in_month: usize,
    pub completed_days: usize,
    pub grid: Vec<GridRow>,
    pub plans: Vec<PlanSnapshot>,
}

impl SegmentReport {
    pub fn row(&self, metric_code: &str) -> Option<&GridRow> {
        self.grid.iter().find(|r| r.metric_code == metric_code)
    }

    /// 指标逐日序列（目录中不存在时返回 None）
    pub fn day_values(&self, metric_code: &str) -> Option<&[Option<f64>]> {
        self.row(metric_code).map(|r| r.day_values.as_slice())
    }

    pub fn month_total(&self, metric_code: &str) -> Option<f64> {
        self.row(metric_code).and_then(|r| r.month_total)
    }

    /// 计划指标月计划（缺失为 0）
    pub fn plan_month(&self, code: PlanMetricCode) -> f64 {
        self.plans
            .iter()
            .find(|p| p.plan_metric_code == code)
            .map(|p| p.effective_plan())
            .unwrap_or(0.0)
    }
}

// ==========================================
// 驾驶舱 KPI
// ==========================================

/// 计划/实际/完成率 轨道
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanTrackKpis {
    pub plan_month: f64,
    pub plan_to_date: f64,
    pub fact_to_date: f64,
    pub fact_month: f64,
    pub completion_to_date_pct: f64,
    pub completion_month_pct: f64,
    pub avg_per_day: f64,
    pub deviation_to_date: f64, // 实际 - 计划（累计）
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerKpis {
    pub track: PlanTrackKpis,
    pub gross_value_to_date: f64,
    pub gross_value_month: f64,
    pub gross_value_avg_per_day: f64,
    pub vehicles_on_line_avg: Option<f64>,
}

/// 各通道待发余额（截止日快照）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitingSnapshot {
    pub truck: Option<f64>,
    pub container_in_truck: Option<f64>,
    pub curtain: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckDispatchKpis {
    pub truck_curtain: PlanTrackKpis,
    pub container_in_truck: PlanTrackKpis,
    pub combined: PlanTrackKpis,
    pub waiting: WaitingSnapshot,
    pub debt_receivable: Option<f64>,
    pub debt_payable: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraCategoryKpi {
    pub metric_code: String,
    pub metric_name: String,
    pub fact_to_date: f64,
    pub fact_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraServicesKpis {
    pub categories: Vec<ExtraCategoryKpi>,
    pub total_to_date: f64,
    pub total_month: f64,
}

/// 板块驾驶舱（按板块类别区分 KPI 集）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardKpis {
    Container(ContainerKpis),
    TruckDispatch(TruckDispatchKpis),
    Rail(PlanTrackKpis),
    Maintenance(PlanTrackKpis),
    ExtraServices(ExtraServicesKpis),
}

/// 驾驶舱公共量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardWindow {
    pub days_in_month: usize,
    pub completed_days: usize,
    pub data_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDashboard {
    pub window: DashboardWindow,
    pub kpis: DashboardKpis,
}

// ==========================================
// 跨板块汇总
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub segment_code: SegmentCode,
    pub segment_name: String,
    pub detail: Option<String>, // 明细行标签（汇总行为空）
    pub plan_month: Option<f64>, // 仅事实行为空
    pub plan_to_date: Option<f64>,
    pub fact_to_date: f64,
    pub fact_month: f64,
    pub completion_to_date_pct: Option<f64>,
    pub completion_month_pct: Option<f64>,
    pub avg_per_day: f64,
}

// ==========================================
// 年度合计
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearMonthCell {
    pub month: u32,
    pub base_plan: f64,
    pub carry_plan: f64,
    pub fact: f64,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearTotalsRow {
    pub row_key: String,
    pub title: String,
    pub segment_code: SegmentCode,
    pub plan_metric_code: Option<PlanMetricCode>,
    pub plan_tracked: bool,
    pub months: Vec<YearMonthCell>,
    pub yearly_base_plan: f64,
    pub yearly_carry_plan: f64,
    pub yearly_fact: f64,
    pub yearly_completion_pct: f64,
}
