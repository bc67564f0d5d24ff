// ==========================================
// 物流运营报表系统 - 待发余额解析引擎
// ==========================================
// 职责: 汽运发运三条通道的待发余额（存量）跨月结转
// 规则: balance[d] = balance[d-1] + received[d] - sent[d]，balance[-1] = 月初余额
// 月初余额 = 上一个有数据月份的月末余额，向前回溯至多 max_depth 个月
// 红线:
// - 每个月的月末 = 该月月初 + 该月净收发，种子只使用一次
// - 显式种子月份是锚点：月初 = 种子，回溯到此为止
// - 回溯耗尽时月初按 0 处理并告警，不作为错误抛出
// ==========================================

use std::collections::HashMap;

use crate::domain::catalog::Metric;
use crate::domain::daily_value::{DaySeries, SeriesMap};
use crate::domain::period::ReportPeriod;
use crate::domain::plan::LaneBalances;
use crate::domain::types::{FormulaKind, TruckLane};
use crate::engine::repositories::ReportDataSource;
use crate::repository::RepositoryResult;
use tracing::instrument;

/// 月初余额来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartSource {
    /// 本月或更早月份的显式种子
    Seed(ReportPeriod),
    /// 回溯窗口内未找到种子，以 0 为基数
    ZeroBase { exhausted: bool },
}

/// 月初余额解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartBalance {
    pub balances: LaneBalances,
    pub source: StartSource,
    /// 参与累计的有数据月份数
    pub months_applied: usize,
}

/// 单通道逐日滚动余额
pub fn running_balance(start: f64, received: &[Option<f64>], sent: &[Option<f64>], days: usize) -> DaySeries {
    let mut balance = start;
    (0..days)
        .map(|day| {
            let r = received.get(day).copied().flatten().unwrap_or(0.0);
            let s = sent.get(day).copied().flatten().unwrap_or(0.0);
            balance += r - s;
            Some(balance)
        })
        .collect()
}

/// 单通道某月净收发
fn lane_net(series: &HashMap<&str, DaySeries>, lane: TruckLane) -> f64 {
    let total = |code: &str| -> f64 {
        series
            .get(code)
            .map(|s| s.iter().map(|v| v.unwrap_or(0.0)).sum())
            .unwrap_or(0.0)
    };
    total(lane.received_code()) - total(lane.sent_code())
}

// ==========================================
// WaitingBalanceResolver - 待发余额解析引擎
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct WaitingBalanceResolver {
    max_depth: u32,
}

impl WaitingBalanceResolver {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// 解析某月月初三通道余额
    ///
    /// 迭代实现：一次查询回溯窗口内的有数据月份与种子，
    /// 自近向远收集月份链，再自远向近累加各月净收发。
    #[instrument(skip(self, source, metrics), fields(segment_id = segment_id, period = %period))]
    pub fn resolve_start(
        &self,
        source: &dyn ReportDataSource,
        segment_id: i64,
        period: ReportPeriod,
        metrics: &[Metric],
    ) -> RepositoryResult<StartBalance> {
        // 本月自身有种子 → 直接作为月初
        let own_seed = source.waiting_seeds(segment_id, period, period)?;
        if let Some(seed) = own_seed.get(&(period.year(), period.month())) {
            return Ok(StartBalance {
                balances: *seed,
                source: StartSource::Seed(period),
                months_applied: 0,
            });
        }

        let (Some(newest), Some(oldest)) = (period.previous(), period.months_back(self.max_depth)) else {
            return Ok(self.zero_base(period, true, 0));
        };
        if self.max_depth == 0 {
            return Ok(self.zero_base(period, true, 0));
        }

        let with_data = source.months_with_data(segment_id, oldest, newest)?;
        let seeds = source.waiting_seeds(segment_id, oldest, newest)?;

        // 自近向远: 收集有数据月份，遇到种子停止
        let mut chain: Vec<ReportPeriod> = Vec::new();
        let mut anchor: Option<(ReportPeriod, LaneBalances)> = None;
        let mut cursor = Some(newest);
        let mut depth = 0u32;
        while let Some(month) = cursor {
            if depth >= self.max_depth {
                break;
            }
            let key = (month.year(), month.month());
            if with_data.contains(&key) {
                chain.push(month);
            }
            if let Some(seed) = seeds.get(&key) {
                anchor = Some((month, *seed));
                break;
            }
            depth += 1;
            cursor = month.previous();
        }

        let mut balances = anchor.map(|(_, seed)| seed).unwrap_or_default();
        let months_applied = chain.len();

        // 自远向近: 每个月只累加一次净收发
        if let (Some(first), Some(last)) = (chain.last().copied(), chain.first().copied()) {
            let values = source.load_values(segment_id, first.first_day(), last.last_day())?;
            let code_by_id: HashMap<i64, &str> = metrics
                .iter()
                .map(|m| (m.metric_id, m.code.as_str()))
                .collect();

            for month in chain.iter().rev() {
                let mut month_series: HashMap<&str, DaySeries> = HashMap::new();
                for v in &values {
                    let (Some(idx), Some(code)) =
                        (month.day_index(v.value_date), code_by_id.get(&v.metric_id))
                    else {
                        continue;
                    };
                    let s = month_series
                        .entry(*code)
                        .or_insert_with(|| vec![None; month.days_in_month()]);
                    s[idx] = v.value;
                }
                for lane in TruckLane::ALL {
                    *balances.get_mut(lane) += lane_net(&month_series, lane);
                }
            }
        }

        Ok(match anchor {
            Some((seed_month, _)) => StartBalance {
                balances,
                source: StartSource::Seed(seed_month),
                months_applied,
            },
            None => {
                let exhausted = months_applied == 0;
                let mut start = self.zero_base(period, exhausted, months_applied);
                start.balances = balances;
                start
            }
        })
    }

    fn zero_base(&self, period: ReportPeriod, exhausted: bool, months_applied: usize) -> StartBalance {
        if exhausted {
            tracing::warn!(
                period = %period,
                max_depth = self.max_depth,
                "待发余额回溯 {} 个月未找到历史数据，月初余额按 0 处理",
                self.max_depth
            );
        } else {
            tracing::debug!(period = %period, months_applied, "待发余额回溯未找到种子，以 0 为基数累计");
        }
        StartBalance {
            balances: LaneBalances::zero(),
            source: StartSource::ZeroBase { exhausted },
            months_applied,
        }
    }

    /// 以月初余额滚动填充三条通道的待发行（目录中存在的通道才写入）
    pub fn fill_month(
        &self,
        start: &LaneBalances,
        metrics: &[Metric],
        series: &mut SeriesMap,
        days: usize,
    ) {
        for lane in TruckLane::ALL {
            let Some(target) = metrics
                .iter()
                .find(|m| m.formula == Some(FormulaKind::TruckWaitingLane(lane)))
            else {
                continue;
            };

            let empty = Vec::new();
            let received = series.get(lane.received_code()).unwrap_or(&empty);
            let sent = series.get(lane.sent_code()).unwrap_or(&empty);
            let balance = running_balance(start.get(lane), received, sent, days);
            series.insert(target.code.clone(), balance);
        }
    }
}
