// ==========================================
// 物流运营报表系统 - 月报 API
// ==========================================
// 职责: 板块月报 + 驾驶舱、跨板块汇总
// 架构: API 层 → SegmentReportBuilder → DashboardKpiCalculator
// 红线: 只读，不创建月度计划
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::PeriodValidator;
use crate::domain::report::{SegmentDashboard, SegmentReport, SummaryRow};
use crate::domain::types::SegmentCode;
use crate::engine::dashboard::DashboardKpiCalculator;
use crate::engine::report_builder::SegmentReportBuilder;
use crate::repository::RepositoryError;

/// 板块月报响应
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReportResponse {
    pub report: SegmentReport,
    pub dashboard: SegmentDashboard,
}

/// 解析板块代码；未知代码视为“板块不存在”
pub(crate) fn parse_segment_code(raw: &str) -> ApiResult<SegmentCode> {
    raw.parse::<SegmentCode>()
        .map_err(|e| ApiError::NotFound(e.to_string()))
}

// ==========================================
// ReportApi - 月报 API
// ==========================================
pub struct ReportApi {
    builder: Arc<SegmentReportBuilder>,
    calculator: DashboardKpiCalculator,
    validator: PeriodValidator,
}

impl ReportApi {
    pub fn new(builder: Arc<SegmentReportBuilder>, validator: PeriodValidator) -> Self {
        Self {
            builder,
            calculator: DashboardKpiCalculator::new(),
            validator,
        }
    }

    /// 构建板块月报
    ///
    /// # 参数
    /// - segment_code: 板块代码（如 CONTAINER_EAST）
    /// - year / month: 报表期间
    /// - as_of: 截止日（缺省为今天，超出本月时夹取）
    ///
    /// # 返回
    /// - Err(ApiError::NotFound): 板块不存在
    /// - Err(ApiError::InvalidPeriod): 期间非法
    pub fn build_segment_report(
        &self,
        segment_code: &str,
        year: i32,
        month: u32,
        as_of: Option<NaiveDate>,
    ) -> ApiResult<SegmentReportResponse> {
        let period = self.validator.validate_period(year, month)?;
        let code = parse_segment_code(segment_code)?;

        let report = self.builder.build(code, period, as_of)?;
        let dashboard = self.calculator.calculate(&report);
        Ok(SegmentReportResponse { report, dashboard })
    }

    /// 跨板块汇总
    ///
    /// 目录中缺失的板块跳过并告警；其余错误直接返回。
    pub fn get_summary_across_segments(
        &self,
        year: i32,
        month: u32,
        as_of: Option<NaiveDate>,
        detailed: bool,
    ) -> ApiResult<Vec<SummaryRow>> {
        let period = self.validator.validate_period(year, month)?;

        let mut rows = Vec::new();
        for code in SegmentCode::ALL {
            let report = match self.builder.build(code, period, as_of) {
                Ok(r) => r,
                Err(RepositoryError::NotFound { .. }) => {
                    tracing::warn!(segment = %code, "目录中缺少板块，汇总时跳过");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let dashboard = self.calculator.calculate(&report);
            rows.extend(self.calculator.summary_rows(&report, &dashboard, detailed));
        }

        tracing::info!(period = %period, detailed, rows = rows.len(), "跨板块汇总完成");
        Ok(rows)
    }
}
