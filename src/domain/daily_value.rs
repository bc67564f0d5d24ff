// ==========================================
// 物流运营报表系统 - 逐日数值
// ==========================================
// 红线: “无数据”(None) 与 0 严格区分，直到汇总规则才做处理
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 逐日观测值，主键 (value_date, metric_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub value_date: NaiveDate,
    pub metric_id: i64,
    pub value: Option<f64>,
}

/// 一个月的逐日序列，长度固定为月天数
pub type DaySeries = Vec<Option<f64>>;

/// 指标代码 → 逐日序列
pub type SeriesMap = HashMap<String, DaySeries>;

/// 全部为“无数据”的序列
pub fn empty_series(days: usize) -> DaySeries {
    vec![None; days]
}

/// 持久化口径：保留 2 位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(-2.344), -2.34);
        assert_eq!(round2(10.0), 10.0);
    }
}
