// ==========================================
// 物流运营报表系统 - 请求参数校验器
// ==========================================
// 职责: 在任何计算开始之前拒绝非法期间 / 非法输入
// ==========================================

use chrono::NaiveDate;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ReportConfig;
use crate::domain::period::ReportPeriod;

// ==========================================
// PeriodValidator - 期间校验器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct PeriodValidator {
    min_year: i32,
    max_year: i32,
}

impl PeriodValidator {
    pub fn new(min_year: i32, max_year: i32) -> Self {
        Self { min_year, max_year }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.min_year, config.max_year)
    }

    /// 校验年份
    pub fn validate_year(&self, year: i32) -> ApiResult<()> {
        if year < self.min_year || year > self.max_year {
            return Err(ApiError::InvalidPeriod(format!(
                "年份{}超出允许范围[{}, {}]",
                year, self.min_year, self.max_year
            )));
        }
        Ok(())
    }

    /// 校验年月并构造期间
    pub fn validate_period(&self, year: i32, month: u32) -> ApiResult<ReportPeriod> {
        self.validate_year(year)?;
        ReportPeriod::new(year, month)
            .ok_or_else(|| ApiError::InvalidPeriod(format!("月份{}不在1-12之间", month)))
    }

    /// 截止日必须可解析；落在期间之外的截止日由报表构建夹取，不视为错误
    pub fn parse_as_of(&self, raw: Option<&str>) -> ApiResult<Option<NaiveDate>> {
        raw.map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| ApiError::InvalidInput(format!("截止日格式错误({}): {}", s, e)))
        })
        .transpose()
    }
}

/// 校验计划数值：必须为有限非负数
pub fn validate_plan_value(value: f64) -> ApiResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::InvalidInput(format!("计划值必须为非负有限数: {}", value)));
    }
    Ok(())
}
