// ==========================================
// 物流运营报表系统 - 引擎层
// ==========================================
// 职责: 报表与结转计算规则,不拼 SQL
// 红线: 读路径无副作用；持久化只发生在 API 层的结转写入
// ==========================================

pub mod carry_over;
pub mod dashboard;
pub mod formula;
pub mod report_builder;
pub mod repositories;
pub mod series;
pub mod waiting_balance;
pub mod year_totals;

// 重导出核心引擎
pub use carry_over::{CarryOverMonth, ClassicCarryOverCalculator};
pub use dashboard::{completion_pct, plan_to_date, DashboardKpiCalculator};
pub use formula::{sum_of_parts, FormulaRowEvaluator};
pub use report_builder::SegmentReportBuilder;
pub use repositories::{ReportDataSource, ReportRepositories};
pub use waiting_balance::{running_balance, StartBalance, StartSource, WaitingBalanceResolver};
pub use year_totals::{build_row, collect_facts, YearTotalsAggregator};
