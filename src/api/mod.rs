// ==========================================
// 物流运营报表系统 - API 层
// ==========================================
// 职责: 参数校验、错误转换、编排引擎与持久化
// ==========================================

pub mod error;
pub mod plan_api;
pub mod report_api;
pub mod validator;

// 重导出核心 API
pub use error::{ApiError, ApiResult};
pub use plan_api::PlanApi;
pub use report_api::{ReportApi, SegmentReportResponse};
pub use validator::{validate_plan_value, PeriodValidator};
