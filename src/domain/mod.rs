// ==========================================
// 物流运营报表系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、封闭枚举、期间运算、报表输出结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod daily_value;
pub mod period;
pub mod plan;
pub mod report;
pub mod types;

// 重导出核心类型
pub use catalog::{default_catalog, metric_codes, Metric, MetricSeed, Segment, SegmentSeed};
pub use daily_value::{empty_series, round2, DailyValue, DaySeries, SeriesMap};
pub use period::{data_days, days_in_month, ReportPeriod};
pub use plan::{LaneBalances, MonthlyPlan, MonthlyPlanMetric, PlanSeed, PlanSeriesRow};
pub use report::{
    ContainerKpis, DashboardKpis, DashboardWindow, ExtraCategoryKpi, ExtraServicesKpis, GridRow,
    PlanSnapshot, PlanTrackKpis, SegmentDashboard, SegmentReport, SummaryRow, TruckDispatchKpis,
    WaitingSnapshot, YearMonthCell, YearTotalsRow,
};
pub use types::{
    Aggregation, FormulaKind, FormulaRule, PlanMetricCode, SegmentCode, SegmentKind, TruckLane,
    UnknownCodeError, ValueType, CARRY_MODE_CLASSIC,
};
