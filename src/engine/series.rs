// ==========================================
// 物流运营报表系统 - 逐日序列工具
// ==========================================
// 职责: 数值分桶 + 月度汇总规则（SUM / AVG / LAST）+ 窗口求和
// 红线: 求和时“无数据”按 0；LAST 向后查找时跳过“无数据”
// ==========================================

use std::collections::HashMap;

use crate::domain::catalog::Metric;
use crate::domain::daily_value::{empty_series, DailyValue, SeriesMap};
use crate::domain::period::ReportPeriod;
use crate::domain::types::Aggregation;

/// 将逐日数值按指标代码 + 日下标分桶
///
/// 目录中每个指标都得到一条长度为月天数的序列；
/// 引用了不在当前目录快照中的指标的数值被忽略。
pub fn bucket_values(period: ReportPeriod, metrics: &[Metric], values: &[DailyValue]) -> SeriesMap {
    let days = period.days_in_month();
    let mut series: SeriesMap = metrics
        .iter()
        .map(|m| (m.code.clone(), empty_series(days)))
        .collect();
    let code_by_id: HashMap<i64, &str> = metrics
        .iter()
        .map(|m| (m.metric_id, m.code.as_str()))
        .collect();

    let mut stale = 0usize;
    for v in values {
        let Some(idx) = period.day_index(v.value_date) else {
            continue;
        };
        match code_by_id.get(&v.metric_id) {
            Some(code) => {
                if let Some(slot) = series.get_mut(*code).and_then(|s| s.get_mut(idx)) {
                    *slot = v.value;
                }
            }
            None => stale += 1,
        }
    }

    if stale > 0 {
        tracing::debug!(period = %period, stale, "忽略引用已移出目录指标的逐日数值");
    }
    series
}

/// 窗口内求和（“无数据”按 0）
pub fn sum_window(values: &[Option<f64>], len: usize) -> f64 {
    values.iter().take(len).map(|v| v.unwrap_or(0.0)).sum()
}

/// 最近一个有值日的数值（显式 0 也算有值）
pub fn last_known(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}

/// 有值日的算术平均；全部无数据时为 None
pub fn average_known(values: &[Option<f64>]) -> Option<f64> {
    let known: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    }
}

/// 逐日对位相加（“无数据”按 0，结果总是有值）
pub fn add_series(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<f64>> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().flatten().unwrap_or(0.0);
            let y = b.get(i).copied().flatten().unwrap_or(0.0);
            Some(x + y)
        })
        .collect()
}

/// 指标月度合计
///
/// - 存量型（LAST 或待发余额公式）: 最近一个有值日
/// - AVG: 有值日平均
/// - 其余: 全月求和；整月无数据时为 None
pub fn month_total(metric: &Metric, values: &[Option<f64>]) -> Option<f64> {
    if metric.is_stock() {
        return last_known(values);
    }
    match metric.aggregation {
        Aggregation::Avg => average_known(values),
        Aggregation::Sum | Aggregation::Formula | Aggregation::Last => {
            if values.iter().all(|v| v.is_none()) {
                None
            } else {
                Some(sum_window(values, values.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FormulaKind, TruckLane, ValueType};
    use chrono::NaiveDate;

    fn metric(id: i64, code: &str, aggregation: Aggregation, formula: Option<FormulaKind>) -> Metric {
        Metric {
            metric_id: id,
            segment_id: 1,
            code: code.to_string(),
            name: code.to_string(),
            is_editable: formula.is_none(),
            value_type: ValueType::Integer,
            aggregation,
            formula,
            order_index: id as i32,
        }
    }

    #[test]
    fn test_last_skips_missing_days() {
        let m = metric(1, "debt_payable", Aggregation::Last, None);
        let values = [Some(5.0), None, Some(8.0), None];
        assert_eq!(month_total(&m, &values), Some(8.0));
    }

    #[test]
    fn test_last_treats_explicit_zero_as_value() {
        let m = metric(1, "debt_payable", Aggregation::Last, None);
        assert_eq!(month_total(&m, &[Some(5.0), Some(0.0), None]), Some(0.0));
    }

    #[test]
    fn test_waiting_formula_is_stock_even_if_declared_sum() {
        let m = metric(
            1,
            "waiting_truck",
            Aggregation::Formula,
            Some(FormulaKind::TruckWaitingLane(TruckLane::Truck)),
        );
        assert_eq!(month_total(&m, &[Some(12.0), Some(10.0), Some(12.0)]), Some(12.0));
    }

    #[test]
    fn test_sum_and_avg_totals() {
        let sum = metric(1, "fact_unload", Aggregation::Sum, None);
        assert_eq!(month_total(&sum, &[Some(1.0), None, Some(2.5)]), Some(3.5));
        assert_eq!(month_total(&sum, &[None, None]), None);

        let avg = metric(2, "vehicles_on_line", Aggregation::Avg, None);
        assert_eq!(month_total(&avg, &[Some(4.0), None, Some(6.0)]), Some(5.0));
        assert_eq!(month_total(&avg, &[None]), None);
    }

    #[test]
    fn test_bucket_values_ignores_stale_metric_and_other_months() {
        let period = ReportPeriod::new(2024, 2).unwrap();
        let metrics = vec![metric(1, "fact_unload", Aggregation::Sum, None)];
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let values = vec![
            DailyValue { value_date: d(1), metric_id: 1, value: Some(3.0) },
            DailyValue { value_date: d(29), metric_id: 1, value: None },
            DailyValue { value_date: d(2), metric_id: 99, value: Some(7.0) },
            DailyValue {
                value_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                metric_id: 1,
                value: Some(1.0),
            },
        ];

        let series = bucket_values(period, &metrics, &values);
        assert_eq!(series.len(), 1);
        let s = &series["fact_unload"];
        assert_eq!(s.len(), 29);
        assert_eq!(s[0], Some(3.0));
        assert_eq!(s[1], None);
        assert_eq!(s[28], None);
    }

    #[test]
    fn test_sum_window_and_add_series() {
        let a = [Some(1.0), None, Some(3.0)];
        let b = [None, Some(2.0), None];
        assert_eq!(sum_window(&a, 2), 1.0);
        assert_eq!(add_series(&a, &b), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }
}
