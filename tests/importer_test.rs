// ==========================================
// 逐日数值 CSV 导入集成测试
// ==========================================


use std::fs;

use logistics_ops_report::domain::metric_codes as mc;
use logistics_ops_report::importer::ImportError;
use tempfile::tempdir;
use test_helpers::{date, TestEnv};

#[test]
fn test_import_csv_accepts_valid_rows_and_counts_rejections() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let dir = tempdir().expect("无法创建临时目录");
    let path = dir.path().join("values.csv");
    fs::write(
        &path,
        "date,segment_code,metric_code,value\n\
         2024-03-01,CONTAINER_EAST,fact_unload,12\n\
         20240302,container_east,fact_unload,8.5\n\
         2024-03-03,CONTAINER_EAST,fact_move,\n\
         ,,,\n\
         2024-03-04,AIR_FREIGHT,fact_unload,1\n\
         2024-03-04,CONTAINER_EAST,no_such_metric,1\n\
         2024-03-04,CONTAINER_EAST,fact_total_per_day,99\n\
         2024-02-30,CONTAINER_EAST,fact_unload,1\n\
         2024-03-05,CONTAINER_EAST,fact_unload,abc\n",
    )
    .expect("写入 CSV 失败");

    let summary = env.state.importer.import_csv(&path).expect("导入失败");

    // 空行不计入
    assert_eq!(summary.total_rows, 8);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.rejected.len(), 5);
    let rejected_rows: Vec<usize> = summary.rejected.iter().map(|r| r.row).collect();
    assert_eq!(rejected_rows, vec![5, 6, 7, 8, 9]);

    let response = env
        .state
        .report_api
        .build_segment_report("CONTAINER_EAST", 2024, 3, Some(date(2024, 3, 31)))
        .expect("构建月报失败");
    let unload = response.report.day_values(mc::FACT_UNLOAD).expect("缺少卸箱行");
    assert_eq!(unload[0], Some(12.0));
    assert_eq!(unload[1], Some(8.5));
    assert_eq!(unload[4], None);
    // 空值导入为显式“无数据”
    assert_eq!(response.report.day_values(mc::FACT_MOVE).expect("缺少倒箱行")[2], None);
    assert_eq!(response.report.month_total(mc::FACT_TOTAL_PER_DAY), Some(20.5));
}

#[test]
fn test_import_overwrites_existing_value() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let dir = tempdir().expect("无法创建临时目录");
    let path = dir.path().join("rail.csv");
    fs::write(
        &path,
        "date,segment_code,metric_code,value\n2024-07-01,RAIL,rail_loaded,5\n",
    )
    .expect("写入 CSV 失败");
    env.state.importer.import_csv(&path).expect("导入失败");

    fs::write(
        &path,
        "date,segment_code,metric_code,value\n2024-07-01,RAIL,rail_loaded,7.456\n",
    )
    .expect("写入 CSV 失败");
    env.state.importer.import_csv(&path).expect("导入失败");

    let response = env
        .state
        .report_api
        .build_segment_report("RAIL", 2024, 7, None)
        .expect("构建月报失败");
    // 数值按 2 位小数持久化
    assert_eq!(response.report.month_total(mc::RAIL_LOADED), Some(7.46));
}

#[test]
fn test_import_missing_column_is_fatal() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let dir = tempdir().expect("无法创建临时目录");
    let path = dir.path().join("bad.csv");
    fs::write(&path, "date,segment_code,metric_code\n2024-01-01,RAIL,rail_loaded\n")
        .expect("写入 CSV 失败");

    let result = env.state.importer.import_csv(&path);
    assert!(matches!(result, Err(ImportError::MissingColumn(ref c)) if c == "value"));
}

#[test]
fn test_import_file_errors() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let dir = tempdir().expect("无法创建临时目录");

    let missing = dir.path().join("missing.csv");
    assert!(matches!(
        env.state.importer.import_csv(&missing),
        Err(ImportError::FileNotFound(_))
    ));

    let txt = dir.path().join("values.txt");
    fs::write(&txt, "date,segment_code,metric_code,value\n").expect("写入文件失败");
    assert!(matches!(
        env.state.importer.import_csv(&txt),
        Err(ImportError::UnsupportedFormat(_))
    ));
}
