// ==========================================
// 物流运营报表系统 - 领域类型定义
// ==========================================
// 职责: 业务板块 / 聚合方式 / 公式 / 计划指标等封闭枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use crate::domain::catalog::metric_codes as mc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 代码解析失败（数据库或外部输入中出现未知代码）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的{kind}代码: {value}")]
pub struct UnknownCodeError {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownCodeError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ==========================================
// 业务板块代码 (Segment Code)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentCode {
    ContainerEast, // 集装箱运输（东线）
    ContainerWest, // 集装箱运输（西线）
    TruckDispatch, // 汽运发运
    Rail,          // 铁路
    ExtraServices, // 附加服务
    Maintenance,   // 维修
}

impl SegmentCode {
    pub const ALL: [SegmentCode; 6] = [
        SegmentCode::ContainerEast,
        SegmentCode::ContainerWest,
        SegmentCode::TruckDispatch,
        SegmentCode::Rail,
        SegmentCode::ExtraServices,
        SegmentCode::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentCode::ContainerEast => "CONTAINER_EAST",
            SegmentCode::ContainerWest => "CONTAINER_WEST",
            SegmentCode::TruckDispatch => "TRUCK_DISPATCH",
            SegmentCode::Rail => "RAIL",
            SegmentCode::ExtraServices => "EXTRA_SERVICES",
            SegmentCode::Maintenance => "MAINTENANCE",
        }
    }

    /// 板块类别（决定公式规则集与驾驶舱 KPI 集）
    pub fn kind(&self) -> SegmentKind {
        match self {
            SegmentCode::ContainerEast | SegmentCode::ContainerWest => SegmentKind::Container,
            SegmentCode::TruckDispatch => SegmentKind::TruckDispatch,
            SegmentCode::Rail => SegmentKind::Rail,
            SegmentCode::ExtraServices => SegmentKind::ExtraServices,
            SegmentCode::Maintenance => SegmentKind::Maintenance,
        }
    }
}

impl fmt::Display for SegmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SegmentCode {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        SegmentCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCodeError::new("业务板块", s))
    }
}

/// 板块类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentKind {
    Container,
    TruckDispatch,
    Rail,
    Maintenance,
    ExtraServices,
}

// ==========================================
// 月度汇总方式 (Aggregation)
// ==========================================
// 流量型: SUM / AVG
// 存量型: LAST（向后取最近一个有值日）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    Sum,
    Avg,
    Last,
    Formula,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Last => "LAST",
            Aggregation::Formula => "FORMULA",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUM" => Ok(Aggregation::Sum),
            "AVG" => Ok(Aggregation::Avg),
            "LAST" => Ok(Aggregation::Last),
            "FORMULA" => Ok(Aggregation::Formula),
            _ => Err(UnknownCodeError::new("聚合方式", s)),
        }
    }
}

// ==========================================
// 数值类型 (仅用于展示)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Integer,
    Decimal,
    Currency,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Integer => "INTEGER",
            ValueType::Decimal => "DECIMAL",
            ValueType::Currency => "CURRENCY",
        }
    }
}

impl FromStr for ValueType {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTEGER" => Ok(ValueType::Integer),
            "DECIMAL" => Ok(ValueType::Decimal),
            "CURRENCY" => Ok(ValueType::Currency),
            _ => Err(UnknownCodeError::new("数值类型", s)),
        }
    }
}

// ==========================================
// 汽运通道 (Truck Lane)
// ==========================================
// 三条通道各自维护待发余额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruckLane {
    Truck,            // 普通汽运
    ContainerInTruck, // 集装箱汽运
    Curtain,          // 篷布车
}

impl TruckLane {
    pub const ALL: [TruckLane; 3] = [TruckLane::Truck, TruckLane::ContainerInTruck, TruckLane::Curtain];

    pub fn as_str(&self) -> &'static str {
        match self {
            TruckLane::Truck => "TRUCK",
            TruckLane::ContainerInTruck => "CONTAINER_IN_TRUCK",
            TruckLane::Curtain => "CURTAIN",
        }
    }

    pub fn received_code(&self) -> &'static str {
        match self {
            TruckLane::Truck => mc::RECEIVED_TRUCK,
            TruckLane::ContainerInTruck => mc::RECEIVED_CIT,
            TruckLane::Curtain => mc::RECEIVED_CURTAIN,
        }
    }

    pub fn sent_code(&self) -> &'static str {
        match self {
            TruckLane::Truck => mc::SENT_TRUCK,
            TruckLane::ContainerInTruck => mc::SENT_CIT,
            TruckLane::Curtain => mc::SENT_CURTAIN,
        }
    }

    pub fn waiting_code(&self) -> &'static str {
        match self {
            TruckLane::Truck => mc::WAITING_TRUCK,
            TruckLane::ContainerInTruck => mc::WAITING_CIT,
            TruckLane::Curtain => mc::WAITING_CURTAIN,
        }
    }
}

impl fmt::Display for TruckLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 公式标识 (Formula Kind)
// ==========================================
// 红线: 封闭枚举，每种派生计算一个分支，编译期穷举检查
// 数据库 metric.formula 存放 as_str() 标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FormulaKind {
    ContainerPlanTotal,
    ContainerFactTotal,
    TruckReceivedTotal,
    TruckSentTotal,
    TruckWaitingLane(TruckLane),
    TruckWaitingTotal,
    RailTotal,
    MaintenanceTotal,
    ExtraServicesTotal,
}

/// 公式规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaRule {
    /// target[day] = Σ source[day]（无数据按 0）
    SumOfParts(&'static [&'static str]),
    /// 由待发余额解析器按通道滚动计算
    WaitingBalance(TruckLane),
}

const CONTAINER_EAST_WEST_RULES: &[FormulaKind] =
    &[FormulaKind::ContainerPlanTotal, FormulaKind::ContainerFactTotal];

const TRUCK_DISPATCH_RULES: &[FormulaKind] = &[
    FormulaKind::TruckReceivedTotal,
    FormulaKind::TruckSentTotal,
    FormulaKind::TruckWaitingLane(TruckLane::Truck),
    FormulaKind::TruckWaitingLane(TruckLane::ContainerInTruck),
    FormulaKind::TruckWaitingLane(TruckLane::Curtain),
    // 必须排在三条通道之后
    FormulaKind::TruckWaitingTotal,
];

impl FormulaKind {
    pub const ALL: [FormulaKind; 11] = [
        FormulaKind::ContainerPlanTotal,
        FormulaKind::ContainerFactTotal,
        FormulaKind::TruckReceivedTotal,
        FormulaKind::TruckSentTotal,
        FormulaKind::TruckWaitingLane(TruckLane::Truck),
        FormulaKind::TruckWaitingLane(TruckLane::ContainerInTruck),
        FormulaKind::TruckWaitingLane(TruckLane::Curtain),
        FormulaKind::TruckWaitingTotal,
        FormulaKind::RailTotal,
        FormulaKind::MaintenanceTotal,
        FormulaKind::ExtraServicesTotal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaKind::ContainerPlanTotal => "CONTAINER_PLAN_TOTAL",
            FormulaKind::ContainerFactTotal => "CONTAINER_FACT_TOTAL",
            FormulaKind::TruckReceivedTotal => "TRUCK_RECEIVED_TOTAL",
            FormulaKind::TruckSentTotal => "TRUCK_SENT_TOTAL",
            FormulaKind::TruckWaitingLane(TruckLane::Truck) => "TRUCK_WAITING_TRUCK",
            FormulaKind::TruckWaitingLane(TruckLane::ContainerInTruck) => "TRUCK_WAITING_CIT",
            FormulaKind::TruckWaitingLane(TruckLane::Curtain) => "TRUCK_WAITING_CURTAIN",
            FormulaKind::TruckWaitingTotal => "TRUCK_WAITING_TOTAL",
            FormulaKind::RailTotal => "RAIL_TOTAL",
            FormulaKind::MaintenanceTotal => "MAINTENANCE_TOTAL",
            FormulaKind::ExtraServicesTotal => "EXTRA_SERVICES_TOTAL",
        }
    }

    /// 写入的目标指标代码
    pub fn target_code(&self) -> &'static str {
        match self {
            FormulaKind::ContainerPlanTotal => mc::PLAN_TOTAL,
            FormulaKind::ContainerFactTotal => mc::FACT_TOTAL_PER_DAY,
            FormulaKind::TruckReceivedTotal => mc::RECEIVED_TOTAL,
            FormulaKind::TruckSentTotal => mc::SENT_TOTAL,
            FormulaKind::TruckWaitingLane(lane) => lane.waiting_code(),
            FormulaKind::TruckWaitingTotal => mc::WAITING_TOTAL,
            FormulaKind::RailTotal => mc::RAIL_TOTAL,
            FormulaKind::MaintenanceTotal => mc::MAINTENANCE_TOTAL,
            FormulaKind::ExtraServicesTotal => mc::EXTRA_TOTAL,
        }
    }

    pub fn rule(&self) -> FormulaRule {
        match self {
            FormulaKind::ContainerPlanTotal => {
                FormulaRule::SumOfParts(&[mc::PLAN_UNLOAD, mc::PLAN_MOVE])
            }
            FormulaKind::ContainerFactTotal => {
                FormulaRule::SumOfParts(&[mc::FACT_UNLOAD, mc::FACT_MOVE])
            }
            FormulaKind::TruckReceivedTotal => FormulaRule::SumOfParts(&[
                mc::RECEIVED_TRUCK,
                mc::RECEIVED_CIT,
                mc::RECEIVED_CURTAIN,
            ]),
            FormulaKind::TruckSentTotal => {
                FormulaRule::SumOfParts(&[mc::SENT_TRUCK, mc::SENT_CIT, mc::SENT_CURTAIN])
            }
            FormulaKind::TruckWaitingLane(lane) => FormulaRule::WaitingBalance(*lane),
            FormulaKind::TruckWaitingTotal => FormulaRule::SumOfParts(&[
                mc::WAITING_TRUCK,
                mc::WAITING_CIT,
                mc::WAITING_CURTAIN,
            ]),
            FormulaKind::RailTotal => FormulaRule::SumOfParts(&[mc::RAIL_LOADED, mc::RAIL_UNLOADED]),
            FormulaKind::MaintenanceTotal => {
                FormulaRule::SumOfParts(&[mc::REPAIRS_CURRENT, mc::REPAIRS_SCHEDULED])
            }
            FormulaKind::ExtraServicesTotal => FormulaRule::SumOfParts(&[
                mc::EXTRA_WEIGHING,
                mc::EXTRA_SEALING,
                mc::EXTRA_STORAGE,
                mc::EXTRA_CLEANING,
            ]),
        }
    }

    /// 存量型（跨日/跨月结转）
    pub fn is_stock(&self) -> bool {
        matches!(
            self,
            FormulaKind::TruckWaitingLane(_) | FormulaKind::TruckWaitingTotal
        )
    }

    /// 板块的公式规则集（按依赖顺序）
    pub fn for_segment(kind: SegmentKind) -> &'static [FormulaKind] {
        match kind {
            SegmentKind::Container => CONTAINER_EAST_WEST_RULES,
            SegmentKind::TruckDispatch => TRUCK_DISPATCH_RULES,
            SegmentKind::Rail => &[FormulaKind::RailTotal],
            SegmentKind::Maintenance => &[FormulaKind::MaintenanceTotal],
            SegmentKind::ExtraServices => &[FormulaKind::ExtraServicesTotal],
        }
    }
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FormulaKind {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        FormulaKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownCodeError::new("公式", s))
    }
}

impl TryFrom<String> for FormulaKind {
    type Error = UnknownCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormulaKind> for String {
    fn from(value: FormulaKind) -> Self {
        value.as_str().to_string()
    }
}

// ==========================================
// 计划指标代码 (Plan Metric Code)
// ==========================================
// 月度计划口径，与逐日指标目录相互独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanMetricCode {
    ContainerRequestVolume, // 集装箱需求量
    TruckPlan,              // 汽运+篷布车计划
    ContainerInTruckPlan,   // 集装箱汽运计划
    RailPlan,               // 铁路计划
    MaintenancePlan,        // 维修计划
}

impl PlanMetricCode {
    pub const ALL: [PlanMetricCode; 5] = [
        PlanMetricCode::ContainerRequestVolume,
        PlanMetricCode::TruckPlan,
        PlanMetricCode::ContainerInTruckPlan,
        PlanMetricCode::RailPlan,
        PlanMetricCode::MaintenancePlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanMetricCode::ContainerRequestVolume => "CONTAINER_REQUEST_VOLUME",
            PlanMetricCode::TruckPlan => "TRUCK_PLAN",
            PlanMetricCode::ContainerInTruckPlan => "CONTAINER_IN_TRUCK_PLAN",
            PlanMetricCode::RailPlan => "RAIL_PLAN",
            PlanMetricCode::MaintenancePlan => "MAINTENANCE_PLAN",
        }
    }

    /// 计划指标所属的板块类型
    pub fn segment_kind(&self) -> SegmentKind {
        match self {
            PlanMetricCode::ContainerRequestVolume => SegmentKind::Container,
            PlanMetricCode::TruckPlan | PlanMetricCode::ContainerInTruckPlan => {
                SegmentKind::TruckDispatch
            }
            PlanMetricCode::RailPlan => SegmentKind::Rail,
            PlanMetricCode::MaintenancePlan => SegmentKind::Maintenance,
        }
    }
}

impl fmt::Display for PlanMetricCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanMetricCode {
    type Err = UnknownCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        PlanMetricCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCodeError::new("计划指标", s))
    }
}

/// 结转模式标签（仅作信息展示）
pub const CARRY_MODE_CLASSIC: &str = "CLASSIC";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_code_round_trip_and_unknown() {
        assert_eq!("truck_dispatch".parse::<SegmentCode>().unwrap(), SegmentCode::TruckDispatch);
        let err = "HARBOR".parse::<SegmentCode>().unwrap_err();
        assert_eq!(err.value, "HARBOR");
    }

    #[test]
    fn test_every_formula_target_belongs_to_its_rule_set() {
        for kind in [
            SegmentKind::Container,
            SegmentKind::TruckDispatch,
            SegmentKind::Rail,
            SegmentKind::Maintenance,
            SegmentKind::ExtraServices,
        ] {
            for formula in FormulaKind::for_segment(kind) {
                if let FormulaRule::SumOfParts(sources) = formula.rule() {
                    assert!(!sources.contains(&formula.target_code()));
                }
            }
        }
    }

    #[test]
    fn test_formula_identifier_parse() {
        for kind in FormulaKind::ALL {
            assert_eq!(kind.as_str().parse::<FormulaKind>().unwrap(), kind);
        }
        assert!("SOME_FUTURE_FORMULA".parse::<FormulaKind>().is_err());
    }

    #[test]
    fn test_waiting_total_after_lanes() {
        let rules = FormulaKind::for_segment(SegmentKind::TruckDispatch);
        let total_pos = rules.iter().position(|k| *k == FormulaKind::TruckWaitingTotal).unwrap();
        for lane in TruckLane::ALL {
            let lane_pos = rules
                .iter()
                .position(|k| *k == FormulaKind::TruckWaitingLane(lane))
                .unwrap();
            assert!(lane_pos < total_pos);
        }
    }
}
