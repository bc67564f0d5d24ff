// ==========================================
// 物流运营报表系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 计划报表与滚动结转计算引擎
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 报表与结转规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Aggregation, FormulaKind, PlanMetricCode, SegmentCode, SegmentKind};

// 领域实体
pub use domain::{
    DailyValue, LaneBalances, Metric, MonthlyPlan, ReportPeriod, Segment, SegmentDashboard,
    SegmentReport, SummaryRow, YearTotalsRow,
};

// 引擎
pub use engine::{
    ClassicCarryOverCalculator, DashboardKpiCalculator, FormulaRowEvaluator, SegmentReportBuilder,
    WaitingBalanceResolver, YearTotalsAggregator,
};

// API
pub use api::{ApiError, ApiResult, PlanApi, ReportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物流运营报表系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
