// ==========================================
// 物流运营报表系统 - 公式行计算引擎
// ==========================================
// 职责: 按板块规则集由原始逐日序列派生公式行
// 输入: 指标代码 → 逐日序列（已分桶）
// 输出: 同一映射，公式行被覆盖写入
// 红线: 幂等。派生行每次都从来源重新计算，从不累加
// ==========================================

use crate::domain::catalog::Metric;
use crate::domain::daily_value::{DaySeries, SeriesMap};
use crate::domain::types::{FormulaKind, FormulaRule, SegmentKind};
use tracing::instrument;

/// 逐日对位求和，“无数据”按 0
pub fn sum_of_parts(series: &SeriesMap, sources: &[&str], days: usize) -> DaySeries {
    (0..days)
        .map(|day| {
            let total = sources
                .iter()
                .filter_map(|code| series.get(*code))
                .map(|s| s.get(day).copied().flatten().unwrap_or(0.0))
                .sum::<f64>();
            Some(total)
        })
        .collect()
}

// ==========================================
// FormulaRowEvaluator - 公式行计算引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct FormulaRowEvaluator;

impl FormulaRowEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// 计算板块的全部求和类公式行
    ///
    /// 只计算目录中声明了对应公式标识的指标；规则集顺序保证
    /// 待发合计在三条通道之后计算。待发通道行由待发余额解析器写入，这里跳过。
    ///
    /// # 返回
    /// 本次写入的公式行数
    #[instrument(skip(self, metrics, series), fields(segment_kind = ?kind, days = days))]
    pub fn evaluate(
        &self,
        kind: SegmentKind,
        metrics: &[Metric],
        series: &mut SeriesMap,
        days: usize,
    ) -> usize {
        let mut written = 0;

        for formula in FormulaKind::for_segment(kind) {
            let Some(target) = metrics.iter().find(|m| m.formula == Some(*formula)) else {
                continue;
            };

            match formula.rule() {
                FormulaRule::SumOfParts(sources) => {
                    let derived = sum_of_parts(series, sources, days);
                    series.insert(target.code.clone(), derived);
                    written += 1;
                }
                FormulaRule::WaitingBalance(_) => {}
            }
        }

        // 声明了公式但不属于本板块规则集的指标保持“无数据”
        for m in metrics {
            if let Some(formula) = m.formula {
                if !FormulaKind::for_segment(kind).contains(&formula) {
                    tracing::warn!(metric_code = %m.code, formula = %formula, "公式不属于当前板块规则集，已跳过");
                }
            }
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::metric_codes as mc;
    use crate::domain::types::{Aggregation, ValueType};

    fn metric(code: &str, formula: Option<FormulaKind>) -> Metric {
        Metric {
            metric_id: 0,
            segment_id: 1,
            code: code.to_string(),
            name: code.to_string(),
            is_editable: formula.is_none(),
            value_type: ValueType::Integer,
            aggregation: if formula.is_some() { Aggregation::Formula } else { Aggregation::Sum },
            formula,
            order_index: 0,
        }
    }

    fn container_metrics() -> Vec<Metric> {
        vec![
            metric(mc::PLAN_UNLOAD, None),
            metric(mc::PLAN_MOVE, None),
            metric(mc::PLAN_TOTAL, Some(FormulaKind::ContainerPlanTotal)),
            metric(mc::FACT_UNLOAD, None),
            metric(mc::FACT_MOVE, None),
            metric(mc::FACT_TOTAL_PER_DAY, Some(FormulaKind::ContainerFactTotal)),
        ]
    }

    #[test]
    fn test_sum_of_parts_example() {
        let mut series = SeriesMap::new();
        series.insert(mc::PLAN_UNLOAD.to_string(), vec![Some(2.0), Some(3.0), Some(4.0)]);
        series.insert(mc::PLAN_MOVE.to_string(), vec![Some(1.0), Some(1.0), Some(2.0)]);

        FormulaRowEvaluator::new().evaluate(SegmentKind::Container, &container_metrics(), &mut series, 3);

        assert_eq!(series[mc::PLAN_TOTAL], vec![Some(3.0), Some(4.0), Some(6.0)]);
        // 来源全部缺失 → 0 而非“无数据”
        assert_eq!(series[mc::FACT_TOTAL_PER_DAY], vec![Some(0.0); 3]);
    }

    #[test]
    fn test_missing_parts_count_as_zero() {
        let mut series = SeriesMap::new();
        series.insert(mc::FACT_UNLOAD.to_string(), vec![Some(5.0), None]);
        series.insert(mc::FACT_MOVE.to_string(), vec![None, None]);

        FormulaRowEvaluator::new().evaluate(SegmentKind::Container, &container_metrics(), &mut series, 2);

        assert_eq!(series[mc::FACT_TOTAL_PER_DAY], vec![Some(5.0), Some(0.0)]);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut series = SeriesMap::new();
        series.insert(mc::PLAN_UNLOAD.to_string(), vec![Some(2.0), None, Some(4.0)]);
        series.insert(mc::PLAN_MOVE.to_string(), vec![Some(1.0), Some(1.0), None]);
        let metrics = container_metrics();
        let evaluator = FormulaRowEvaluator::new();

        evaluator.evaluate(SegmentKind::Container, &metrics, &mut series, 3);
        let first = series.clone();
        evaluator.evaluate(SegmentKind::Container, &metrics, &mut series, 3);

        assert_eq!(first, series);
    }

    #[test]
    fn test_target_without_declared_formula_is_left_alone() {
        let mut metrics = container_metrics();
        // 公式标识无法识别时，目录加载后 formula 为 None
        metrics[2].formula = None;
        let mut series = SeriesMap::new();
        series.insert(mc::PLAN_TOTAL.to_string(), vec![None, None]);
        series.insert(mc::PLAN_UNLOAD.to_string(), vec![Some(1.0), Some(1.0)]);

        let written = FormulaRowEvaluator::new().evaluate(SegmentKind::Container, &metrics, &mut series, 2);

        assert_eq!(written, 1);
        assert_eq!(series[mc::PLAN_TOTAL], vec![None, None]);
    }
}
