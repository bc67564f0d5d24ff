// ==========================================
// 物流运营报表系统 - 报表期间
// ==========================================
// 职责: 年月期间的日历运算（月天数 / 上月 / 截止日夹取 / 已完成天数）
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// 报表期间（年 + 月）
///
/// 只能通过 `new` 构造，保证 1 号与月天数始终有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

impl ReportPeriod {
    /// 创建期间；月份不在 1..=12 或超出日历范围时返回 None
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        // 同时校验本月 1 号与下月 1 号都可表示
        NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
        Some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// 月序号（year*12 + month-1），用于区间比较
    pub fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    pub fn first_day(&self) -> NaiveDate {
        // new() 已校验
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_days(chrono::Days::new(self.days_in_month() as u64 - 1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(&self) -> usize {
        days_in_month(self.year, self.month)
    }

    pub fn previous(&self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// 向前回退 n 个月
    pub fn months_back(&self, n: u32) -> Option<Self> {
        let ordinal = self.ordinal() - n as i64;
        let year = ordinal.div_euclid(12) as i32;
        let month = ordinal.rem_euclid(12) as u32 + 1;
        Self::new(year, month)
    }

    /// 将截止日夹取到 [月初, 月末]
    pub fn clamp_date(&self, date: NaiveDate) -> NaiveDate {
        date.clamp(self.first_day(), self.last_day())
    }

    /// 已完成天数 = 截止日之前完整经过的天数
    pub fn completed_days(&self, as_of: NaiveDate) -> usize {
        let as_of = self.clamp_date(as_of);
        (as_of.day() as usize).saturating_sub(1).min(self.days_in_month())
    }

    /// 日期在本月内的下标（0 起）
    pub fn day_index(&self, date: NaiveDate) -> Option<usize> {
        if date.year() == self.year && date.month() == self.month {
            Some(date.day() as usize - 1)
        } else {
            None
        }
    }

    pub fn months_of_year(year: i32) -> impl Iterator<Item = ReportPeriod> {
        (1..=12u32).filter_map(move |m| ReportPeriod::new(year, m))
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// 月天数（无效年月返回 0）
pub fn days_in_month(year: i32, month: u32) -> usize {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => next.signed_duration_since(first).num_days() as usize,
        _ => 0,
    }
}

/// 累计取数窗口天数 = max(1, min(月天数, 已完成天数 + 1))
pub fn data_days(days_in_month: usize, completed_days: usize) -> usize {
    (completed_days + 1).min(days_in_month).max(1)
}
