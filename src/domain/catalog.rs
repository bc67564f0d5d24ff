// ==========================================
// 物流运营报表系统 - 目录领域模型
// ==========================================
// 职责: 业务板块 (Segment) 与逐日指标 (Metric) 定义 + 默认目录种子
// 红线: 目录对报表引擎只读
// ==========================================

use crate::domain::types::{Aggregation, FormulaKind, SegmentCode, TruckLane, ValueType};
use serde::{Deserialize, Serialize};

// ==========================================
// Segment - 业务板块
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: i64,
    pub code: SegmentCode,
    pub name: String,
}

// ==========================================
// Metric - 逐日指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub metric_id: i64,
    pub segment_id: i64,
    pub code: String,            // 板块内唯一
    pub name: String,
    pub is_editable: bool,       // 人工录入 / 派生
    pub value_type: ValueType,   // 仅展示用
    pub aggregation: Aggregation,
    pub formula: Option<FormulaKind>,
    pub order_index: i32,
}

impl Metric {
    /// 是否为存量型指标（月度合计取最近值）
    pub fn is_stock(&self) -> bool {
        self.aggregation == Aggregation::Last
            || self.formula.map(|f| f.is_stock()).unwrap_or(false)
    }
}

/// 逐日指标代码常量
pub mod metric_codes {
    // ===== 集装箱 =====
    pub const PLAN_UNLOAD: &str = "plan_unload";
    pub const PLAN_MOVE: &str = "plan_move";
    pub const PLAN_TOTAL: &str = "plan_total";
    pub const FACT_UNLOAD: &str = "fact_unload";
    pub const FACT_MOVE: &str = "fact_move";
    pub const FACT_TOTAL_PER_DAY: &str = "fact_total_per_day";
    pub const GROSS_VALUE: &str = "gross_value";
    pub const VEHICLES_ON_LINE: &str = "vehicles_on_line";

    // ===== 汽运发运 =====
    pub const RECEIVED_TRUCK: &str = "received_truck";
    pub const RECEIVED_CIT: &str = "received_cit";
    pub const RECEIVED_CURTAIN: &str = "received_curtain";
    pub const RECEIVED_TOTAL: &str = "received_total";
    pub const SENT_TRUCK: &str = "sent_truck";
    pub const SENT_CIT: &str = "sent_cit";
    pub const SENT_CURTAIN: &str = "sent_curtain";
    pub const SENT_TOTAL: &str = "sent_total";
    pub const WAITING_TRUCK: &str = "waiting_truck";
    pub const WAITING_CIT: &str = "waiting_cit";
    pub const WAITING_CURTAIN: &str = "waiting_curtain";
    pub const WAITING_TOTAL: &str = "waiting_total";
    pub const DEBT_RECEIVABLE: &str = "debt_receivable";
    pub const DEBT_PAYABLE: &str = "debt_payable";

    // ===== 铁路 =====
    pub const RAIL_LOADED: &str = "rail_loaded";
    pub const RAIL_UNLOADED: &str = "rail_unloaded";
    pub const RAIL_TOTAL: &str = "rail_total";

    // ===== 维修 =====
    pub const REPAIRS_CURRENT: &str = "repairs_current";
    pub const REPAIRS_SCHEDULED: &str = "repairs_scheduled";
    pub const MAINTENANCE_TOTAL: &str = "maintenance_total";

    // ===== 附加服务 =====
    pub const EXTRA_WEIGHING: &str = "extra_weighing";
    pub const EXTRA_SEALING: &str = "extra_sealing";
    pub const EXTRA_STORAGE: &str = "extra_storage";
    pub const EXTRA_CLEANING: &str = "extra_cleaning";
    pub const EXTRA_TOTAL: &str = "extra_total";

    /// 附加服务四个子类（按展示顺序）
    pub const EXTRA_CATEGORIES: [&str; 4] =
        [EXTRA_WEIGHING, EXTRA_SEALING, EXTRA_STORAGE, EXTRA_CLEANING];
}

// ==========================================
// 目录种子定义
// ==========================================

#[derive(Debug, Clone)]
pub struct MetricSeed {
    pub code: &'static str,
    pub name: &'static str,
    pub is_editable: bool,
    pub value_type: ValueType,
    pub aggregation: Aggregation,
    pub formula: Option<FormulaKind>,
}

#[derive(Debug, Clone)]
pub struct SegmentSeed {
    pub code: SegmentCode,
    pub name: &'static str,
    pub metrics: Vec<MetricSeed>,
}

fn input(code: &'static str, name: &'static str, value_type: ValueType, aggregation: Aggregation) -> MetricSeed {
    MetricSeed {
        code,
        name,
        is_editable: true,
        value_type,
        aggregation,
        formula: None,
    }
}

fn derived(code: &'static str, name: &'static str, aggregation: Aggregation, formula: FormulaKind) -> MetricSeed {
    MetricSeed {
        code,
        name,
        is_editable: false,
        value_type: ValueType::Decimal,
        aggregation,
        formula: Some(formula),
    }
}

fn container_metrics() -> Vec<MetricSeed> {
    use metric_codes::*;
    vec![
        input(PLAN_UNLOAD, "计划卸箱", ValueType::Integer, Aggregation::Sum),
        input(PLAN_MOVE, "计划倒箱", ValueType::Integer, Aggregation::Sum),
        derived(PLAN_TOTAL, "计划合计", Aggregation::Sum, FormulaKind::ContainerPlanTotal),
        input(FACT_UNLOAD, "实际卸箱", ValueType::Integer, Aggregation::Sum),
        input(FACT_MOVE, "实际倒箱", ValueType::Integer, Aggregation::Sum),
        derived(FACT_TOTAL_PER_DAY, "当日实际合计", Aggregation::Sum, FormulaKind::ContainerFactTotal),
        input(GROSS_VALUE, "营业额", ValueType::Currency, Aggregation::Sum),
        input(VEHICLES_ON_LINE, "在线车辆数", ValueType::Integer, Aggregation::Avg),
    ]
}

/// 默认目录（启动时一次性写入）
pub fn default_catalog() -> Vec<SegmentSeed> {
    use metric_codes::*;

    let mut truck_metrics = vec![
        input(RECEIVED_TRUCK, "到货-汽运", ValueType::Integer, Aggregation::Sum),
        input(RECEIVED_CIT, "到货-集装箱汽运", ValueType::Integer, Aggregation::Sum),
        input(RECEIVED_CURTAIN, "到货-篷布车", ValueType::Integer, Aggregation::Sum),
        derived(RECEIVED_TOTAL, "到货合计", Aggregation::Sum, FormulaKind::TruckReceivedTotal),
        input(SENT_TRUCK, "发运-汽运", ValueType::Integer, Aggregation::Sum),
        input(SENT_CIT, "发运-集装箱汽运", ValueType::Integer, Aggregation::Sum),
        input(SENT_CURTAIN, "发运-篷布车", ValueType::Integer, Aggregation::Sum),
        derived(SENT_TOTAL, "发运合计", Aggregation::Sum, FormulaKind::TruckSentTotal),
    ];
    for (lane, name) in [
        (TruckLane::Truck, "待发-汽运"),
        (TruckLane::ContainerInTruck, "待发-集装箱汽运"),
        (TruckLane::Curtain, "待发-篷布车"),
    ] {
        truck_metrics.push(derived(
            lane.waiting_code(),
            name,
            Aggregation::Last,
            FormulaKind::TruckWaitingLane(lane),
        ));
    }
    truck_metrics.push(derived(WAITING_TOTAL, "待发合计", Aggregation::Last, FormulaKind::TruckWaitingTotal));
    truck_metrics.push(input(DEBT_RECEIVABLE, "应收欠款", ValueType::Currency, Aggregation::Last));
    truck_metrics.push(input(DEBT_PAYABLE, "应付欠款", ValueType::Currency, Aggregation::Last));

    vec![
        SegmentSeed {
            code: SegmentCode::ContainerEast,
            name: "集装箱运输（东线）",
            metrics: container_metrics(),
        },
        SegmentSeed {
            code: SegmentCode::ContainerWest,
            name: "集装箱运输（西线）",
            metrics: container_metrics(),
        },
        SegmentSeed {
            code: SegmentCode::TruckDispatch,
            name: "汽运发运",
            metrics: truck_metrics,
        },
        SegmentSeed {
            code: SegmentCode::Rail,
            name: "铁路",
            metrics: vec![
                input(RAIL_LOADED, "装车", ValueType::Integer, Aggregation::Sum),
                input(RAIL_UNLOADED, "卸车", ValueType::Integer, Aggregation::Sum),
                derived(RAIL_TOTAL, "铁路合计", Aggregation::Sum, FormulaKind::RailTotal),
            ],
        },
        SegmentSeed {
            code: SegmentCode::ExtraServices,
            name: "附加服务",
            metrics: vec![
                input(EXTRA_WEIGHING, "过磅", ValueType::Currency, Aggregation::Sum),
                input(EXTRA_SEALING, "施封", ValueType::Currency, Aggregation::Sum),
                input(EXTRA_STORAGE, "仓储", ValueType::Currency, Aggregation::Sum),
                input(EXTRA_CLEANING, "清洗", ValueType::Currency, Aggregation::Sum),
                derived(EXTRA_TOTAL, "附加服务合计", Aggregation::Sum, FormulaKind::ExtraServicesTotal),
            ],
        },
        SegmentSeed {
            code: SegmentCode::Maintenance,
            name: "维修",
            metrics: vec![
                input(REPAIRS_CURRENT, "日常维修", ValueType::Integer, Aggregation::Sum),
                input(REPAIRS_SCHEDULED, "计划维修", ValueType::Integer, Aggregation::Sum),
                derived(MAINTENANCE_TOTAL, "维修合计", Aggregation::Sum, FormulaKind::MaintenanceTotal),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FormulaRule;
    use std::collections::HashSet;

    #[test]
    fn test_default_catalog_covers_every_formula_source() {
        for seed in default_catalog() {
            let codes: HashSet<&str> = seed.metrics.iter().map(|m| m.code).collect();
            assert_eq!(codes.len(), seed.metrics.len(), "{} 存在重复指标代码", seed.code);

            for formula in FormulaKind::for_segment(seed.code.kind()) {
                assert!(codes.contains(formula.target_code()));
                if let FormulaRule::SumOfParts(sources) = formula.rule() {
                    for source in sources {
                        assert!(codes.contains(source), "{} 缺少来源指标 {}", seed.code, source);
                    }
                }
            }
        }
    }
}
