// ==========================================
// 物流运营报表系统 - 经典结转计划计算引擎
// ==========================================
// 规则（按 1→12 月顺序折叠，debt 初始为 0）:
//   carry[m] = base[m] + debt
//   debt     = max(0, carry[m] - fact[m])
//   pct[m]   = pct(fact[m], 1 月取 base[1]，其余取 carry[m])
// 红线: 超额完成只冲减欠账至 0，不产生负欠账
// 年度合计展示与持久化共用本引擎，避免两处口径漂移
// ==========================================

use crate::domain::plan::PlanSeriesRow;
use crate::engine::dashboard::completion_pct;
use serde::Serialize;

/// 单月结转结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarryOverMonth {
    pub month: u32,
    pub base_plan: f64,
    pub carry_plan: f64,
    pub fact: f64,
    pub debt_after: f64,
    pub completion_pct: f64,
}

impl CarryOverMonth {
    pub fn to_series_row(&self) -> PlanSeriesRow {
        PlanSeriesRow {
            month: self.month,
            base_plan: self.base_plan,
            carry_plan: self.carry_plan,
        }
    }
}

// ==========================================
// ClassicCarryOverCalculator - 经典结转计划计算引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicCarryOverCalculator;

impl ClassicCarryOverCalculator {
    pub fn new() -> Self {
        Self
    }

    /// 计算一年 12 个月的结转计划
    pub fn calculate(&self, base_plans: &[f64; 12], facts: &[f64; 12]) -> Vec<CarryOverMonth> {
        let mut debt = 0.0_f64;
        let mut months = Vec::with_capacity(12);

        for (idx, (&base_plan, &fact)) in base_plans.iter().zip(facts.iter()).enumerate() {
            let carry_plan = base_plan + debt;
            debt = (carry_plan - fact).max(0.0);

            let pct_base = if idx == 0 { base_plan } else { carry_plan };
            months.push(CarryOverMonth {
                month: idx as u32 + 1,
                base_plan,
                carry_plan,
                fact,
                debt_after: debt,
                completion_pct: completion_pct(fact, pct_base),
            });
        }

        months
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year(prefix: &[f64]) -> [f64; 12] {
        let mut out = [0.0; 12];
        out[..prefix.len()].copy_from_slice(prefix);
        out
    }

    #[test]
    fn test_shortfall_carries_and_surplus_caps_at_zero() {
        let base = year(&[100.0, 100.0, 100.0]);
        let fact = year(&[80.0, 150.0]);

        let months = ClassicCarryOverCalculator::new().calculate(&base, &fact);
        let carry: Vec<f64> = months.iter().map(|m| m.carry_plan).collect();

        assert_eq!(&carry[..4], &[100.0, 120.0, 100.0, 100.0]);
        assert_eq!(months[0].debt_after, 20.0);
        assert_eq!(months[1].debt_after, 0.0);
        assert_eq!(months[0].completion_pct, 80.0);
        assert_eq!(months[1].completion_pct, 125.0);
        // 3 月之后未完成的 100 持续结转
        assert_eq!(months[11].carry_plan, 100.0);
    }

    #[test]
    fn test_debt_never_negative() {
        let base = [10.0; 12];
        let fact = [1000.0; 12];
        let months = ClassicCarryOverCalculator::new().calculate(&base, &fact);
        assert!(months.iter().all(|m| m.debt_after == 0.0 && m.carry_plan == 10.0));
    }

    #[test]
    fn test_zero_plan_completion_is_zero() {
        let months = ClassicCarryOverCalculator::new().calculate(&[0.0; 12], &year(&[5.0]));
        assert_eq!(months[0].completion_pct, 0.0);
    }

    #[test]
    fn test_same_inputs_same_series() {
        let base = year(&[50.0, 60.0, 70.0, 80.0]);
        let fact = year(&[10.0, 100.0, 0.0, 90.0]);
        let calc = ClassicCarryOverCalculator::new();
        assert_eq!(calc.calculate(&base, &fact), calc.calculate(&base, &fact));
    }
}
