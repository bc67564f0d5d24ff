// ==========================================
// 物流运营报表系统 - 月度计划领域模型
// ==========================================
// 职责: MonthlyPlan（板块×年×月）与 MonthlyPlanMetric（计划×计划指标）
// 红线: carry_plan 只能由滚动结转算法整体写入，不可单月独立赋值
// ==========================================

use crate::domain::types::{PlanMetricCode, TruckLane};
use serde::{Deserialize, Serialize};

// ==========================================
// MonthlyPlan - 月度计划
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlan {
    pub plan_id: String,
    pub segment_id: i64,
    pub year: i32,
    pub month: u32,
    pub seed_json: Option<String>, // 自由格式种子参数（如待发期初余额）
    pub created_at: String,
    pub updated_at: String,
}

impl MonthlyPlan {
    /// 解析待发期初余额种子；无种子或格式错误时返回 None
    pub fn waiting_seed(&self) -> Option<LaneBalances> {
        let raw = self.seed_json.as_deref()?;
        match serde_json::from_str::<PlanSeed>(raw) {
            Ok(seed) => seed.waiting_start,
            Err(e) => {
                tracing::warn!(plan_id = %self.plan_id, "月度计划种子参数解析失败，已忽略: {}", e);
                None
            }
        }
    }
}

/// MonthlyPlan.seed_json 的结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_start: Option<LaneBalances>,
}

// ==========================================
// LaneBalances - 三通道余额
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneBalances {
    #[serde(default)]
    pub truck: f64,
    #[serde(default)]
    pub container_in_truck: f64,
    #[serde(default)]
    pub curtain: f64,
}

impl LaneBalances {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, lane: TruckLane) -> f64 {
        match lane {
            TruckLane::Truck => self.truck,
            TruckLane::ContainerInTruck => self.container_in_truck,
            TruckLane::Curtain => self.curtain,
        }
    }

    pub fn get_mut(&mut self, lane: TruckLane) -> &mut f64 {
        match lane {
            TruckLane::Truck => &mut self.truck,
            TruckLane::ContainerInTruck => &mut self.container_in_truck,
            TruckLane::Curtain => &mut self.curtain,
        }
    }

    pub fn total(&self) -> f64 {
        self.truck + self.container_in_truck + self.curtain
    }
}

// ==========================================
// MonthlyPlanMetric - 月度计划指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlanMetric {
    pub plan_id: String,
    pub plan_metric_code: PlanMetricCode,
    pub base_plan: f64,          // 人工设定计划
    pub carry_plan: Option<f64>, // 含结转计划（未计算时为空）
    pub carry_mode: String,      // 信息标签
    pub updated_at: String,
}

impl MonthlyPlanMetric {
    /// 驾驶舱口径：已计算结转计划时取结转计划，否则取基础计划
    pub fn effective_plan(&self) -> f64 {
        self.carry_plan.unwrap_or(self.base_plan)
    }
}

/// 一年中某月的计划写入行（整年结转重算时批量持久化）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSeriesRow {
    pub month: u32,
    pub base_plan: f64,
    pub carry_plan: f64,
}
