// ==========================================
// 物流运营报表系统 - 命令行入口
// ==========================================
// 输出: 结果 JSON 打印到 stdout，日志写 stderr
// 数据库: OPS_REPORT_DB 或用户数据目录
// ==========================================

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use logistics_ops_report::api::PeriodValidator;
use logistics_ops_report::app::{get_default_db_path, AppState};
use logistics_ops_report::domain::LaneBalances;
use logistics_ops_report::logging;

const USAGE: &str = r#"用法:
  logistics-ops-report report <SEGMENT> <YYYY> <MM> [YYYY-MM-DD]
  logistics-ops-report summary <YYYY> <MM> [YYYY-MM-DD] [--detailed]
  logistics-ops-report year-totals <YYYY> [--deadline-ms <MS>]
  logistics-ops-report set-plan <YYYY> <MM> <SEGMENT> <PLAN_METRIC> <VALUE>
  logistics-ops-report recalc <YYYY> <SEGMENT> <PLAN_METRIC>
  logistics-ops-report set-seed <YYYY> <MM> <TRUCK> <CIT> <CURTAIN>
  logistics-ops-report import <FILE.csv>
  logistics-ops-report config [<KEY> [<VALUE>]]"#;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("缺少参数 <{}>\n{}", name, USAGE))
}

fn parse_arg<T>(args: &[String], idx: usize, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = arg(args, idx, name)?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("参数 <{}> 无效: {} ({})", name, raw, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let db_path = get_default_db_path();
    tracing::info!("物流运营报表系统 v{}，数据库: {}", logistics_ops_report::VERSION, db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let validator = PeriodValidator::from_config(&state.config);

    match command {
        "report" => {
            let segment = arg(&args, 1, "SEGMENT")?;
            let year = parse_arg::<i32>(&args, 2, "YYYY")?;
            let month = parse_arg::<u32>(&args, 3, "MM")?;
            let as_of = validator.parse_as_of(args.get(4).map(String::as_str))?;
            let response = state
                .report_api
                .build_segment_report(segment, year, month, as_of)?;
            print_json(&response)?;
        }
        "summary" => {
            let year = parse_arg::<i32>(&args, 1, "YYYY")?;
            let month = parse_arg::<u32>(&args, 2, "MM")?;
            let detailed = args.iter().any(|a| a == "--detailed");
            let as_of_raw = args
                .get(3)
                .map(String::as_str)
                .filter(|a| !a.starts_with("--"));
            let as_of = validator.parse_as_of(as_of_raw)?;
            let rows = state
                .report_api
                .get_summary_across_segments(year, month, as_of, detailed)?;
            print_json(&rows)?;
        }
        "year-totals" => {
            let year = parse_arg::<i32>(&args, 1, "YYYY")?;
            let rows = match args.iter().position(|a| a == "--deadline-ms") {
                Some(idx) => {
                    let ms = parse_arg::<u64>(&args, idx + 1, "MS")?;
                    state
                        .plan_api
                        .clone()
                        .get_year_totals_within(year, Duration::from_millis(ms))
                        .await?
                }
                None => state.plan_api.get_year_totals(year)?,
            };
            print_json(&rows)?;
        }
        "set-plan" => {
            let year = parse_arg::<i32>(&args, 1, "YYYY")?;
            let month = parse_arg::<u32>(&args, 2, "MM")?;
            let segment = arg(&args, 3, "SEGMENT")?;
            let plan_metric = arg(&args, 4, "PLAN_METRIC")?;
            let value = parse_arg::<f64>(&args, 5, "VALUE")?;
            let row = state
                .plan_api
                .update_base_plan(year, month, segment, plan_metric, value)?;
            print_json(&row)?;
        }
        "recalc" => {
            let year = parse_arg::<i32>(&args, 1, "YYYY")?;
            let segment = arg(&args, 2, "SEGMENT")?;
            let plan_metric = arg(&args, 3, "PLAN_METRIC")?;
            let row = state.plan_api.recalculate_carry(year, segment, plan_metric)?;
            print_json(&row)?;
        }
        "set-seed" => {
            let year = parse_arg::<i32>(&args, 1, "YYYY")?;
            let month = parse_arg::<u32>(&args, 2, "MM")?;
            let seed = LaneBalances {
                truck: parse_arg(&args, 3, "TRUCK")?,
                container_in_truck: parse_arg(&args, 4, "CIT")?,
                curtain: parse_arg(&args, 5, "CURTAIN")?,
            };
            let plan = state
                .plan_api
                .set_waiting_seed(year, month, "TRUCK_DISPATCH", seed)?;
            print_json(&plan)?;
        }
        "import" => {
            let file = arg(&args, 1, "FILE.csv")?;
            let summary = state
                .importer
                .import_csv(Path::new(file))
                .with_context(|| format!("导入失败: {}", file))?;
            print_json(&summary)?;
        }
        "config" => {
            if args.len() == 2 {
                let value = state
                    .config_manager
                    .get_global_config_value(&args[1])
                    .map_err(|e| anyhow!("读取配置失败: {}", e))?;
                print_json(&serde_json::json!({ "key": args[1], "value": value }))?;
                return Ok(());
            }
            if args.len() >= 3 {
                state
                    .config_manager
                    .set_global_config_value(&args[1], &args[2])
                    .map_err(|e| anyhow!("写入配置失败: {}", e))?;
                tracing::info!(key = %args[1], "配置已更新，下次启动生效");
            }
            let snapshot = state
                .config_manager
                .get_config_snapshot()
                .map_err(|e| anyhow!("读取配置失败: {}", e))?;
            println!("{}", snapshot);
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}
