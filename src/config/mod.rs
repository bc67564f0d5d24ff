// ==========================================
// 物流运营报表系统 - 配置层
// ==========================================
// 职责: 系统配置管理 + 引擎配置快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod report_config;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use report_config::{default_pairings, validate_pairings, PlanPairing, ReportConfig};
