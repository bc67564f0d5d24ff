// ==========================================
// 物流运营报表系统 - 报表引擎配置快照
// ==========================================
// 职责: 启动时从 config_kv 读取一次，之后只读并显式传入引擎
// 内容: 待发余额回溯上限 / 年份校验范围 / 年度合计配对表
// ==========================================

use crate::config::config_manager::{defaults, ConfigManager};
use crate::domain::catalog::{default_catalog, metric_codes as mc};
use crate::domain::types::{PlanMetricCode, SegmentCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;

// ==========================================
// PlanPairing - 年度合计配对行
// ==========================================
/// 一行年度合计：板块 + 计划指标（仅事实行为空）+ 提供月度事实的指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPairing {
    pub row_key: String,
    pub title: String,
    pub segment_code: SegmentCode,
    #[serde(default)]
    pub plan_metric: Option<PlanMetricCode>,
    pub fact_metrics: Vec<String>,
}

impl PlanPairing {
    fn new(
        row_key: &str,
        title: &str,
        segment_code: SegmentCode,
        plan_metric: Option<PlanMetricCode>,
        fact_metrics: &[&str],
    ) -> Self {
        Self {
            row_key: row_key.to_string(),
            title: title.to_string(),
            segment_code,
            plan_metric,
            fact_metrics: fact_metrics.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_plan_tracked(&self) -> bool {
        self.plan_metric.is_some()
    }
}

/// 默认配对表
pub fn default_pairings() -> Vec<PlanPairing> {
    use PlanMetricCode as P;
    use SegmentCode as S;

    vec![
        PlanPairing::new(
            "CONTAINER_EAST",
            "集装箱运输（东线）",
            S::ContainerEast,
            Some(P::ContainerRequestVolume),
            &[mc::FACT_TOTAL_PER_DAY],
        ),
        PlanPairing::new(
            "CONTAINER_WEST",
            "集装箱运输（西线）",
            S::ContainerWest,
            Some(P::ContainerRequestVolume),
            &[mc::FACT_TOTAL_PER_DAY],
        ),
        PlanPairing::new(
            "TRUCK_DISPATCH_TRUCK",
            "汽运发运（汽运+篷布车）",
            S::TruckDispatch,
            Some(P::TruckPlan),
            &[mc::SENT_TRUCK, mc::SENT_CURTAIN],
        ),
        PlanPairing::new(
            "TRUCK_DISPATCH_CIT",
            "汽运发运（集装箱汽运）",
            S::TruckDispatch,
            Some(P::ContainerInTruckPlan),
            &[mc::SENT_CIT],
        ),
        PlanPairing::new("RAIL", "铁路", S::Rail, Some(P::RailPlan), &[mc::RAIL_TOTAL]),
        PlanPairing::new(
            "MAINTENANCE",
            "维修",
            S::Maintenance,
            Some(P::MaintenancePlan),
            &[mc::MAINTENANCE_TOTAL],
        ),
        PlanPairing::new(
            "EXTRA_WEIGHING",
            "附加服务 - 过磅",
            S::ExtraServices,
            None,
            &[mc::EXTRA_WEIGHING],
        ),
        PlanPairing::new(
            "EXTRA_SEALING",
            "附加服务 - 施封",
            S::ExtraServices,
            None,
            &[mc::EXTRA_SEALING],
        ),
        PlanPairing::new(
            "EXTRA_STORAGE",
            "附加服务 - 仓储",
            S::ExtraServices,
            None,
            &[mc::EXTRA_STORAGE],
        ),
        PlanPairing::new(
            "EXTRA_CLEANING",
            "附加服务 - 清洗",
            S::ExtraServices,
            None,
            &[mc::EXTRA_CLEANING],
        ),
    ]
}

/// 校验配对表
///
/// - row_key 唯一，(板块, 计划指标) 组合唯一
/// - 计划指标属于该板块类型
/// - 事实指标非空且均在该板块的默认目录中
pub fn validate_pairings(pairings: &[PlanPairing]) -> Result<(), String> {
    let catalog = default_catalog();
    let mut keys = HashSet::new();
    let mut plan_pairs = HashSet::new();

    for p in pairings {
        if !keys.insert(p.row_key.as_str()) {
            return Err(format!("配对表 row_key 重复: {}", p.row_key));
        }
        if p.fact_metrics.is_empty() {
            return Err(format!("配对行 {} 缺少事实指标", p.row_key));
        }

        if let Some(plan_metric) = p.plan_metric {
            if plan_metric.segment_kind() != p.segment_code.kind() {
                return Err(format!(
                    "配对行 {} 的计划指标 {} 不属于板块 {}",
                    p.row_key, plan_metric, p.segment_code
                ));
            }
            if !plan_pairs.insert((p.segment_code, plan_metric)) {
                return Err(format!(
                    "配对行 {} 重复配置 {} / {}",
                    p.row_key, p.segment_code, plan_metric
                ));
            }
        }

        let segment = catalog
            .iter()
            .find(|s| s.code == p.segment_code)
            .ok_or_else(|| format!("配对行 {} 的板块 {} 不在目录中", p.row_key, p.segment_code))?;
        if let Some(unknown) = p
            .fact_metrics
            .iter()
            .find(|code| !segment.metrics.iter().any(|m| m.code == code.as_str()))
        {
            return Err(format!(
                "配对行 {} 的事实指标 {} 不在板块 {} 的目录中",
                p.row_key, unknown, p.segment_code
            ));
        }
    }
    Ok(())
}

// ==========================================
// ReportConfig - 引擎配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub waiting_balance_max_depth: u32,
    pub min_year: i32,
    pub max_year: i32,
    pub pairings: Vec<PlanPairing>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            waiting_balance_max_depth: defaults::WAITING_BALANCE_MAX_DEPTH,
            min_year: defaults::PERIOD_MIN_YEAR,
            max_year: defaults::PERIOD_MAX_YEAR,
            pairings: default_pairings(),
        }
    }
}

impl ReportConfig {
    /// 从 config_kv 读取配置快照
    ///
    /// 配对表 JSON 无法解析或校验失败时记录警告并回退默认配对表。
    pub fn load(config: &ConfigManager) -> Result<Self, Box<dyn Error>> {
        let mut min_year = config.get_min_year()?;
        let mut max_year = config.get_max_year()?;
        if min_year > max_year {
            tracing::warn!(min_year, max_year, "年份范围配置颠倒，使用默认范围");
            min_year = defaults::PERIOD_MIN_YEAR;
            max_year = defaults::PERIOD_MAX_YEAR;
        }

        let pairings = match config.get_year_totals_pairings_json()? {
            None => default_pairings(),
            Some(raw) => match serde_json::from_str::<Vec<PlanPairing>>(&raw)
                .map_err(|e| e.to_string())
                .and_then(|p| validate_pairings(&p).map(|_| p))
            {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("年度合计配对表配置无效，使用默认配对表: {}", e);
                    default_pairings()
                }
            },
        };

        Ok(Self {
            waiting_balance_max_depth: config.get_waiting_balance_max_depth()?,
            min_year,
            max_year,
            pairings,
        })
    }

    /// 按板块 + 计划指标查找配对行
    pub fn find_pairing(
        &self,
        segment_code: SegmentCode,
        plan_metric: PlanMetricCode,
    ) -> Option<&PlanPairing> {
        self.pairings
            .iter()
            .find(|p| p.segment_code == segment_code && p.plan_metric == Some(plan_metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_manager::config_keys;
    use crate::db::ensure_schema;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_default_pairings_are_valid() {
        let pairings = default_pairings();
        assert!(validate_pairings(&pairings).is_ok());
        assert_eq!(pairings.iter().filter(|p| !p.is_plan_tracked()).count(), 4);
    }

    #[test]
    fn test_find_pairing() {
        let cfg = ReportConfig::default();
        let p = cfg
            .find_pairing(SegmentCode::TruckDispatch, PlanMetricCode::ContainerInTruckPlan)
            .unwrap();
        assert_eq!(p.fact_metrics, vec![mc::SENT_CIT.to_string()]);
        assert!(cfg
            .find_pairing(SegmentCode::Rail, PlanMetricCode::TruckPlan)
            .is_none());
    }

    #[test]
    fn test_validate_pairings_rejects_mismatched_codes() {
        let mut foreign_fact = default_pairings();
        foreign_fact[4].fact_metrics = vec![mc::SENT_CIT.to_string()];
        assert!(validate_pairings(&foreign_fact).is_err());

        let mut unknown_fact = default_pairings();
        unknown_fact[4].fact_metrics = vec!["rail_loaded_typo".to_string()];
        assert!(validate_pairings(&unknown_fact).is_err());

        let mut foreign_plan = default_pairings();
        foreign_plan[4].plan_metric = Some(PlanMetricCode::TruckPlan);
        assert!(validate_pairings(&foreign_plan).is_err());
    }

    #[test]
    fn test_validate_pairings_rejects_duplicate_plan_pair() {
        let mut pairings = default_pairings();
        let mut twin = pairings[4].clone();
        twin.row_key = "RAIL_SECOND".to_string();
        pairings.push(twin);
        assert!(validate_pairings(&pairings).is_err());

        // 仅事实行可以共用板块
        let mut extra = default_pairings();
        let mut weighing = extra[6].clone();
        weighing.row_key = "EXTRA_WEIGHING_COPY".to_string();
        extra.push(weighing);
        assert!(validate_pairings(&extra).is_ok());
    }

    #[test]
    fn test_load_falls_back_when_fact_metric_unknown() {
        let cm = manager();
        cm.set_global_config_value(
            config_keys::YEAR_TOTALS_PAIRINGS,
            r#"[{"row_key":"RAIL","title":"铁路","segment_code":"RAIL","plan_metric":"RAIL_PLAN","fact_metrics":["sent_truck"]}]"#,
        )
        .unwrap();
        let cfg = ReportConfig::load(&cm).unwrap();
        assert_eq!(cfg.pairings, default_pairings());
    }

    #[test]
    fn test_load_with_pairing_override_and_fallback() {
        let cm = manager();
        cm.set_global_config_value(
            config_keys::YEAR_TOTALS_PAIRINGS,
            r#"[{"row_key":"RAIL","title":"铁路","segment_code":"RAIL","plan_metric":"RAIL_PLAN","fact_metrics":["rail_loaded"]}]"#,
        )
        .unwrap();
        let cfg = ReportConfig::load(&cm).unwrap();
        assert_eq!(cfg.pairings.len(), 1);
        assert_eq!(cfg.pairings[0].fact_metrics, vec!["rail_loaded".to_string()]);

        cm.set_global_config_value(config_keys::YEAR_TOTALS_PAIRINGS, "not json").unwrap();
        let cfg = ReportConfig::load(&cm).unwrap();
        assert_eq!(cfg.pairings, default_pairings());
    }
}
