// ==========================================
// 物流运营报表系统 - 演示数据库生成工具
// ==========================================
// 用法: seed_demo_db [DB_PATH] [YEAR]
// 说明: 已有数据库会先备份再重建；数值按日序确定性生成
// ==========================================

use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};

use logistics_ops_report::app::{get_default_db_path, AppState};
use logistics_ops_report::domain::metric_codes::*;
use logistics_ops_report::domain::{DailyValue, LaneBalances, ReportPeriod, SegmentCode};
use logistics_ops_report::logging;

/// 演示计划（按配对行的板块 + 计划指标）
const DEMO_PLANS: [(&str, &str, f64); 6] = [
    ("CONTAINER_EAST", "CONTAINER_REQUEST_VOLUME", 900.0),
    ("CONTAINER_WEST", "CONTAINER_REQUEST_VOLUME", 600.0),
    ("TRUCK_DISPATCH", "TRUCK_PLAN", 1200.0),
    ("TRUCK_DISPATCH", "CONTAINER_IN_TRUCK_PLAN", 300.0),
    ("RAIL", "RAIL_PLAN", 450.0),
    ("MAINTENANCE", "MAINTENANCE_PLAN", 60.0),
];

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let today = Local::now().date_naive();
    let year = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or_else(|| today.year());

    backup_and_reset_db(&db_path)?;
    let state = AppState::new(db_path.clone())?;

    // 演示数据截止到今天（往年则覆盖整年）
    let last_day = if year == today.year() {
        today
    } else {
        NaiveDate::from_ymd_opt(year, 12, 31).ok_or("年份超出范围")?
    };

    let mut total = 0;
    for code in SegmentCode::ALL {
        let values = demo_values(&state, code, year, last_day)?;
        total += state.daily_value_repo.upsert_batch(&values)?;
    }
    eprintln!("写入逐日数值 {} 条", total);

    state.plan_api.set_waiting_seed(
        year,
        1,
        "TRUCK_DISPATCH",
        LaneBalances {
            truck: 40.0,
            container_in_truck: 12.0,
            curtain: 6.0,
        },
    )?;

    for (segment, plan_metric, monthly) in DEMO_PLANS {
        for month in 1..=12 {
            // 夏季计划上浮 10%
            let plan = if (6..=8).contains(&month) { monthly * 1.1 } else { monthly };
            state
                .plan_api
                .update_base_plan(year, month, segment, plan_metric, plan)?;
        }
        eprintln!("已写入 {} {} 全年计划", segment, plan_metric);
    }

    let rows = state.plan_api.get_year_totals(year)?;
    for row in rows {
        eprintln!(
            "{:<24} 年计划 {:>10.2}  年实际 {:>10.2}  完成率 {:>6.2}%",
            row.title, row.yearly_carry_plan, row.yearly_fact, row.yearly_completion_pct
        );
    }

    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

/// 某板块全年可编辑指标的演示数值
fn demo_values(
    state: &AppState,
    code: SegmentCode,
    year: i32,
    last_day: NaiveDate,
) -> Result<Vec<DailyValue>, Box<dyn Error>> {
    let segment = state
        .catalog_repo
        .find_segment_by_code(code)?
        .ok_or_else(|| format!("目录中缺少板块 {}", code))?;
    let metrics = state.catalog_repo.list_metrics_for_segment(segment.segment_id)?;

    let mut values = Vec::new();
    for period in ReportPeriod::months_of_year(year) {
        for offset in 0..period.days_in_month() {
            let Some(date) = period.first_day().checked_add_days(chrono::Days::new(offset as u64)) else {
                continue;
            };
            if date > last_day {
                break;
            }
            let day = date.ordinal() as f64;
            for metric in metrics.iter().filter(|m| m.is_editable) {
                if let Some(value) = demo_value(&metric.code, day) {
                    values.push(DailyValue {
                        value_date: date,
                        metric_id: metric.metric_id,
                        value: Some(value),
                    });
                }
            }
        }
    }
    Ok(values)
}

fn demo_value(code: &str, day: f64) -> Option<f64> {
    let wave = ((day * 7.0) % 11.0) - 5.0;
    let value = match code {
        PLAN_UNLOAD => 20.0,
        PLAN_MOVE => 10.0,
        FACT_UNLOAD => 18.0 + wave,
        FACT_MOVE => 9.0 + wave / 2.0,
        GROSS_VALUE => 1500.0 + wave * 40.0,
        VEHICLES_ON_LINE => 12.0 + (day % 3.0),
        RECEIVED_TRUCK => 30.0 + wave,
        RECEIVED_CIT => 10.0 + wave / 2.0,
        RECEIVED_CURTAIN => 6.0,
        SENT_TRUCK => 29.0 + wave,
        SENT_CIT => 10.0,
        SENT_CURTAIN => 5.0 + (day % 2.0),
        DEBT_RECEIVABLE => 20000.0 + day * 15.0,
        DEBT_PAYABLE => 8000.0 + day * 5.0,
        RAIL_LOADED => 8.0 + wave / 2.0,
        RAIL_UNLOADED => 7.0,
        REPAIRS_CURRENT => day % 3.0,
        REPAIRS_SCHEDULED => 1.0,
        EXTRA_WEIGHING => 300.0 + wave * 10.0,
        EXTRA_SEALING => 120.0,
        EXTRA_STORAGE => 450.0,
        EXTRA_CLEANING => 80.0 + wave * 3.0,
        _ => return None,
    };
    Some(value.max(0.0))
}
