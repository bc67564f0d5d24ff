// ==========================================
// 物流运营报表系统 - 逐日数值 CSV 导入器
// ==========================================
// 格式: date,segment_code,metric_code,value
// - date: YYYY-MM-DD（兼容 YYYYMMDD）
// - value: 空 = 显式“无数据”
// 规则:
// - 未知板块 / 未知指标 / 派生指标 / 无法解析的行 → 拒绝并计数，不中断导入
// - 有效行单事务批量写入
// ==========================================

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;

use crate::domain::catalog::Metric;
use crate::domain::daily_value::DailyValue;
use crate::domain::types::SegmentCode;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{CatalogRepository, DailyValueRepository};

const REQUIRED_COLUMNS: [&str; 4] = ["date", "segment_code", "metric_code", "value"];

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub row: usize, // 数据行号（表头之后从 1 开始）
    pub reason: String,
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RejectedRow>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

fn parse_value(raw: &str) -> Result<Option<f64>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    let normalized = raw.replace(',', ".").replace(' ', "");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("数值无法解析: {}", raw)),
    }
}

fn field_value<'r>(record: &'r StringRecord, column: &HashMap<&str, usize>, name: &str) -> &'r str {
    column
        .get(name)
        .and_then(|idx| record.get(*idx))
        .unwrap_or("")
}

// ==========================================
// DailyValueImporter - 逐日数值导入器
// ==========================================
pub struct DailyValueImporter {
    catalog_repo: Arc<CatalogRepository>,
    daily_value_repo: Arc<DailyValueRepository>,
}

impl DailyValueImporter {
    pub fn new(
        catalog_repo: Arc<CatalogRepository>,
        daily_value_repo: Arc<DailyValueRepository>,
    ) -> Self {
        Self {
            catalog_repo,
            daily_value_repo,
        }
    }

    /// 从 CSV 文件导入
    pub fn import_csv(&self, file_path: &Path) -> ImportResult<ImportSummary> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
            }
        }

        let file = File::open(file_path)?;
        let summary = self.import_reader(file)?;
        tracing::info!(
            file = %file_path.display(),
            total = summary.total_rows,
            imported = summary.imported,
            rejected = summary.rejected.len(),
            "逐日数值导入完成"
        );
        Ok(summary)
    }

    /// 从任意读取源导入（便于测试与管道输入）
    pub fn import_reader<R: std::io::Read>(&self, reader: R) -> ImportResult<ImportSummary> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let mut column: HashMap<&str, usize> = HashMap::new();
        for name in REQUIRED_COLUMNS {
            let idx = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ImportError::MissingColumn(name.to_string()))?;
            column.insert(name, idx);
        }

        // 板块代码 → (指标代码 → 指标)，按需加载
        let mut catalog: HashMap<SegmentCode, Option<HashMap<String, Metric>>> = HashMap::new();
        let mut summary = ImportSummary::default();
        let mut values: Vec<DailyValue> = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let row = idx + 1;
            let record = record?;
            if record.iter().all(|v| v.is_empty()) {
                continue;
            }
            summary.total_rows += 1;

            match self.parse_row(&record, &column, &mut catalog) {
                Ok(value) => values.push(value),
                Err(reason) => {
                    tracing::debug!(row, reason = %reason, "拒绝导入行");
                    summary.rejected.push(RejectedRow { row, reason });
                }
            }
        }

        summary.imported = self.daily_value_repo.upsert_batch(&values)?;
        Ok(summary)
    }

    fn parse_row(
        &self,
        record: &StringRecord,
        column: &HashMap<&str, usize>,
        catalog: &mut HashMap<SegmentCode, Option<HashMap<String, Metric>>>,
    ) -> Result<DailyValue, String> {
        let field = |name: &str| field_value(record, column, name);

        let date_raw = field("date");
        let value_date = parse_date(date_raw).ok_or_else(|| format!("日期格式错误: {}", date_raw))?;

        let segment_code = field("segment_code")
            .parse::<SegmentCode>()
            .map_err(|e| e.to_string())?;

        if !catalog.contains_key(&segment_code) {
            let metrics = self.load_segment_metrics(segment_code)?;
            catalog.insert(segment_code, metrics);
        }
        let metrics = catalog
            .get(&segment_code)
            .and_then(|m| m.as_ref())
            .ok_or_else(|| format!("目录中不存在板块: {}", segment_code))?;

        let metric_code = field("metric_code");
        let metric = metrics
            .get(metric_code)
            .ok_or_else(|| format!("板块{}不存在指标: {}", segment_code, metric_code))?;
        if !metric.is_editable {
            return Err(format!("指标{}为派生指标，不接受录入", metric_code));
        }

        Ok(DailyValue {
            value_date,
            metric_id: metric.metric_id,
            value: parse_value(field("value"))?,
        })
    }

    fn load_segment_metrics(
        &self,
        code: SegmentCode,
    ) -> Result<Option<HashMap<String, Metric>>, String> {
        let Some(segment) = self
            .catalog_repo
            .find_segment_by_code(code)
            .map_err(|e| e.to_string())?
        else {
            return Ok(None);
        };
        let metrics = self
            .catalog_repo
            .list_metrics_for_segment(segment.segment_id)
            .map_err(|e| e.to_string())?;
        Ok(Some(
            metrics.into_iter().map(|m| (m.code.clone(), m)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(""), Ok(None));
        assert_eq!(parse_value("12.5"), Ok(Some(12.5)));
        assert_eq!(parse_value("12,5"), Ok(Some(12.5)));
        assert_eq!(parse_value("0"), Ok(Some(0.0)));
        assert!(parse_value("abc").is_err());
        assert!(parse_value("inf").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29);
        assert_eq!(parse_date("2024-02-29"), d);
        assert_eq!(parse_date("20240229"), d);
        assert_eq!(parse_date("2023-02-29"), None);
    }
}
