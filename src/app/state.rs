// ==========================================
// 物流运营报表系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// 说明: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{PeriodValidator, PlanApi, ReportApi};
use crate::config::{ConfigManager, ReportConfig};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::catalog::default_catalog;
use crate::engine::{
    ReportDataSource, ReportRepositories, SegmentReportBuilder, WaitingBalanceResolver,
    YearTotalsAggregator,
};
use crate::importer::DailyValueImporter;
use crate::perf::install_sqlite_tracing;
use crate::repository::{CatalogRepository, DailyValueRepository, MonthlyPlanRepository};

/// 应用状态
///
/// 包含所有 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时加载的配置快照
    pub config: Arc<ReportConfig>,

    /// 配置管理器（运维覆写用）
    pub config_manager: Arc<ConfigManager>,

    /// 月报 API
    pub report_api: Arc<ReportApi>,

    /// 计划 API
    pub plan_api: Arc<PlanApi>,

    /// 逐日数值导入器
    pub importer: Arc<DailyValueImporter>,

    /// 目录仓储（种子 / 停用指标）
    pub catalog_repo: Arc<CatalogRepository>,

    /// 逐日数值仓储
    pub daily_value_repo: Arc<DailyValueRepository>,

    /// 月度计划仓储
    pub plan_repo: Arc<MonthlyPlanRepository>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// 该方法会：
    /// 1. 打开数据库并建表（幂等）
    /// 2. 目录为空时写入默认目录
    /// 3. 加载配置快照并创建引擎与 API 实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        install_sqlite_tracing(&mut conn);

        Self::from_connection(db_path, conn)
    }

    /// 基于已打开的连接创建 AppState（测试与工具复用）
    pub fn from_connection(db_path: String, conn: Connection) -> Result<Self, String> {
        ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化 Repository 层
        // ==========================================
        let catalog_repo = Arc::new(CatalogRepository::from_connection(conn.clone()));
        let daily_value_repo = Arc::new(DailyValueRepository::from_connection(conn.clone()));
        let plan_repo = Arc::new(MonthlyPlanRepository::from_connection(conn.clone()));

        let segments = catalog_repo
            .list_segments()
            .map_err(|e| format!("读取目录失败: {}", e))?;
        if segments.is_empty() {
            let written = catalog_repo
                .seed_catalog(&default_catalog())
                .map_err(|e| format!("写入默认目录失败: {}", e))?;
            tracing::info!(metrics = written, "已写入默认目录");
        }

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = Arc::new(
            ReportConfig::load(&config_manager).map_err(|e| format!("加载配置失败: {}", e))?,
        );

        // ==========================================
        // 初始化 Engine 层
        // ==========================================
        let source: Arc<dyn ReportDataSource> = Arc::new(ReportRepositories::new(
            catalog_repo.clone(),
            daily_value_repo.clone(),
            plan_repo.clone(),
        ));
        let builder = Arc::new(SegmentReportBuilder::new(
            source,
            WaitingBalanceResolver::new(config.waiting_balance_max_depth),
        ));
        let aggregator = Arc::new(YearTotalsAggregator::new(builder.clone()));

        // ==========================================
        // 初始化 API 层
        // ==========================================
        let report_api = Arc::new(ReportApi::new(
            builder,
            PeriodValidator::from_config(&config),
        ));
        let plan_api = Arc::new(PlanApi::new(
            catalog_repo.clone(),
            plan_repo.clone(),
            aggregator,
            config.clone(),
        ));
        let importer = Arc::new(DailyValueImporter::new(
            catalog_repo.clone(),
            daily_value_repo.clone(),
        ));

        tracing::info!(
            max_depth = config.waiting_balance_max_depth,
            pairings = config.pairings.len(),
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config,
            config_manager,
            report_api,
            plan_api,
            importer,
            catalog_repo,
            daily_value_repo,
            plan_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 OPS_REPORT_DB 非空时使用其值
/// - 否则: 用户数据目录/logistics-ops-report/ops_report.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("OPS_REPORT_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./ops_report.db");
    if let Some(data_dir) = dirs::data_local_dir() {
        let dir = data_dir.join("logistics-ops-report");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("ops_report.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_from_connection_seeds_catalog_once() {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::from_connection(":memory:".to_string(), conn).unwrap();

        let segments = state.catalog_repo.list_segments().unwrap();
        assert_eq!(segments.len(), 6);
        assert_eq!(state.config.waiting_balance_max_depth, 36);
        assert_eq!(state.get_db_path(), ":memory:");
    }
}
