// ==========================================
// 物流运营报表系统 - 导入层
// ==========================================
// 职责: 外部逐日数值批量导入（运维 / 开发工具）
// 支持: CSV
// ==========================================

pub mod daily_value_importer;
pub mod error;

// 重导出核心类型
pub use daily_value_importer::{DailyValueImporter, ImportSummary, RejectedRow};
pub use error::{ImportError, ImportResult};
