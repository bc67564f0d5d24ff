// ==========================================
// PlanApi 集成测试
// ==========================================
// 测试范围:
// 1. 修改基础计划: 整年结转计划重算并写回
// 2. 仅重算结转
// 3. 年度合计: 计划行 / 仅事实行
// 4. 带截止时间的并发年度合计
// 5. 并发修改不同月份 / 写入中途失败整年回滚
// 6. 参数校验: 未知板块 / 计划指标、非法期间、非法数值
// ==========================================


use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use logistics_ops_report::api::ApiError;
use logistics_ops_report::domain::metric_codes as mc;
use logistics_ops_report::domain::{PlanMetricCode, SegmentCode};
use rusqlite::Connection;
use test_helpers::{assert_approx, date, TestEnv};

/// 铁路: 1 月实际 80，2 月实际 150
fn rail_facts(env: &TestEnv) {
    env.put(SegmentCode::Rail, mc::RAIL_LOADED, date(2024, 1, 10), Some(50.0));
    env.put(SegmentCode::Rail, mc::RAIL_UNLOADED, date(2024, 1, 11), Some(30.0));
    env.put(SegmentCode::Rail, mc::RAIL_LOADED, date(2024, 2, 3), Some(150.0));
}

// ==========================================
// 修改基础计划
// ==========================================

#[test]
fn test_update_base_plan_recalculates_whole_year() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);

    let api = &env.state.plan_api;
    for month in 1..=3 {
        api.update_base_plan(2024, month, "RAIL", "RAIL_PLAN", 100.0)
            .expect("修改计划失败");
    }
    let row = api
        .update_base_plan(2024, 3, "RAIL", "RAIL_PLAN", 100.0)
        .expect("修改计划失败");

    let carry: Vec<f64> = row.months.iter().map(|m| m.carry_plan).collect();
    // 1 月欠 20 → 2 月 120；2 月超额不产生负欠量；3 月欠 100 一直结转
    assert_eq!(&carry[..4], &[100.0, 120.0, 100.0, 100.0]);
    assert_eq!(carry[11], 100.0);
    assert_approx(row.months[0].completion_pct, 80.0);
    assert_approx(row.months[1].completion_pct, 125.0);
    assert_approx(row.yearly_base_plan, 300.0);
    assert_approx(row.yearly_carry_plan, 300.0);
    assert_approx(row.yearly_fact, 230.0);

    // 12 个月全部持久化
    let segment_id = env.segment_id(SegmentCode::Rail);
    for month in 1..=12 {
        let metrics = env
            .state
            .plan_repo
            .find_plan_metrics(segment_id, 2024, month)
            .expect("查询计划失败");
        assert_eq!(metrics.len(), 1, "{}月应有 1 行计划指标", month);
        assert_eq!(metrics[0].plan_metric_code, PlanMetricCode::RailPlan);
        assert_eq!(metrics[0].carry_plan, Some(carry[month as usize - 1]));
        assert_eq!(metrics[0].carry_mode, "CLASSIC");
    }
    let base = env
        .state
        .plan_repo
        .find_year_base_plans(segment_id, 2024, PlanMetricCode::RailPlan)
        .expect("查询基础计划失败");
    assert_eq!(&base[..4], &[100.0, 100.0, 100.0, 0.0]);
}

#[test]
fn test_dashboard_uses_carry_plan_after_update() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);

    let api = &env.state.plan_api;
    api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", 100.0).expect("修改计划失败");
    api.update_base_plan(2024, 2, "RAIL", "RAIL_PLAN", 100.0).expect("修改计划失败");

    let response = env
        .state
        .report_api
        .build_segment_report("RAIL", 2024, 2, Some(date(2024, 2, 29)))
        .expect("构建月报失败");
    assert_eq!(response.report.plan_month(PlanMetricCode::RailPlan), 120.0);
}

#[test]
fn test_update_base_plan_rounds_to_cents() {
    let env = TestEnv::new().expect("无法创建测试环境");

    env.state
        .plan_api
        .update_base_plan(2024, 5, "MAINTENANCE", "MAINTENANCE_PLAN", 10.126)
        .expect("修改计划失败");

    let base = env
        .state
        .plan_repo
        .find_year_base_plans(
            env.segment_id(SegmentCode::Maintenance),
            2024,
            PlanMetricCode::MaintenancePlan,
        )
        .expect("查询基础计划失败");
    assert_eq!(base[4], 10.13);
}

#[test]
fn test_recalculate_carry_keeps_base_plans() {
    let env = TestEnv::new().expect("无法创建测试环境");

    let api = &env.state.plan_api;
    api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", 100.0).expect("修改计划失败");
    api.update_base_plan(2024, 2, "RAIL", "RAIL_PLAN", 100.0).expect("修改计划失败");

    // 事实在计划之后录入
    rail_facts(&env);
    let row = api
        .recalculate_carry(2024, "RAIL", "RAIL_PLAN")
        .expect("重算失败");

    assert_eq!(row.months[0].base_plan, 100.0);
    assert_eq!(row.months[1].carry_plan, 120.0);
    // 2 月超额完成，之后不再结转
    assert_eq!(row.months[2].carry_plan, 0.0);
}

#[test]
fn test_get_or_create_plan_metric_defaults_and_reuse() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let segment_id = env.segment_id(SegmentCode::Maintenance);
    let repo = &env.state.plan_repo;

    let plan = repo.get_or_create_plan(segment_id, 2024, 6).expect("创建计划失败");
    let again = repo.get_or_create_plan(segment_id, 2024, 6).expect("查询计划失败");
    assert_eq!(plan.plan_id, again.plan_id);

    let metric = repo
        .get_or_create_plan_metric(&plan.plan_id, PlanMetricCode::MaintenancePlan)
        .expect("创建计划指标失败");
    assert_eq!(metric.base_plan, 0.0);
    assert_eq!(metric.carry_plan, None);
    assert_eq!(metric.effective_plan(), 0.0);

    // 整年重算写回后复用同一计划行
    env.state
        .plan_api
        .update_base_plan(2024, 6, "MAINTENANCE", "MAINTENANCE_PLAN", 40.0)
        .expect("修改计划失败");
    let metric = repo
        .get_or_create_plan_metric(&plan.plan_id, PlanMetricCode::MaintenancePlan)
        .expect("查询计划指标失败");
    assert_eq!(metric.base_plan, 40.0);
    assert_eq!(metric.carry_plan, Some(40.0));
}

// ==========================================
// 并发修改 / 整年写入原子性
// ==========================================

#[test]
fn test_concurrent_edits_of_different_months_are_both_kept() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);
    let segment_id = env.segment_id(SegmentCode::Rail);

    for round in 1..=20 {
        let march = 100.0 + round as f64;
        let july = 200.0 + round as f64;
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [(3, march), (7, july)]
            .into_iter()
            .map(|(month, value)| {
                let api = Arc::clone(&env.state.plan_api);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    api.update_base_plan(2024, month, "RAIL", "RAIL_PLAN", value)
                })
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .expect("修改线程异常退出")
                .expect("修改计划失败");
        }

        let base = env
            .state
            .plan_repo
            .find_year_base_plans(segment_id, 2024, PlanMetricCode::RailPlan)
            .expect("查询基础计划失败");
        assert_eq!(base[2], march, "第{}轮 3 月基础计划被覆盖", round);
        assert_eq!(base[6], july, "第{}轮 7 月基础计划被覆盖", round);
    }

    // 后提交的一方基于两次修改计算结转: 3 月欠 120 一直结转到 7 月
    let july = env
        .state
        .plan_repo
        .find_plan_metrics(segment_id, 2024, 7)
        .expect("查询计划失败");
    assert_eq!(july[0].carry_plan, Some(340.0));
}

#[test]
fn test_failed_year_write_leaves_every_month_unchanged() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);
    let segment_id = env.segment_id(SegmentCode::Rail);
    let api = &env.state.plan_api;
    api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", 50.0)
        .expect("修改计划失败");

    let snapshot = |env: &TestEnv| -> Vec<(f64, Option<f64>)> {
        (1..=12)
            .map(|month| {
                let metrics = env
                    .state
                    .plan_repo
                    .find_plan_metrics(segment_id, 2024, month)
                    .expect("查询计划失败");
                (metrics[0].base_plan, metrics[0].carry_plan)
            })
            .collect()
    };
    let before = snapshot(&env);

    // 7 月计划行写入被数据库拒绝
    let conn = Connection::open(&env.db_path).expect("无法打开数据库");
    conn.execute_batch(
        r#"
        CREATE TRIGGER reject_july_insert BEFORE INSERT ON monthly_plan_metric
        WHEN (SELECT month FROM monthly_plan WHERE plan_id = NEW.plan_id) = 7
        BEGIN SELECT RAISE(ABORT, 'july row rejected'); END;
        CREATE TRIGGER reject_july_update BEFORE UPDATE ON monthly_plan_metric
        WHEN (SELECT month FROM monthly_plan WHERE plan_id = NEW.plan_id) = 7
        BEGIN SELECT RAISE(ABORT, 'july row rejected'); END;
        "#,
    )
    .expect("创建触发器失败");

    let result = api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", 999.0);
    assert!(matches!(result, Err(ApiError::DatabaseError(_))));

    let after = snapshot(&env);
    assert_eq!(after, before);
    assert_eq!(after[0], (50.0, Some(50.0)));
}

// ==========================================
// 年度合计
// ==========================================

#[test]
fn test_year_totals_rows() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);
    env.put(SegmentCode::ExtraServices, mc::EXTRA_WEIGHING, date(2024, 1, 3), Some(50.0));
    env.put(SegmentCode::TruckDispatch, mc::SENT_TRUCK, date(2024, 3, 1), Some(7.0));
    env.put(SegmentCode::TruckDispatch, mc::SENT_CURTAIN, date(2024, 3, 2), Some(3.0));
    env.state
        .plan_api
        .update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", 100.0)
        .expect("修改计划失败");

    let rows = env.state.plan_api.get_year_totals(2024).expect("年度合计失败");
    assert_eq!(rows.len(), env.state.config.pairings.len());

    let rail = rows.iter().find(|r| r.row_key == "RAIL").expect("缺少铁路行");
    assert!(rail.plan_tracked);
    assert_eq!(rail.months[0].fact, 80.0);
    assert_eq!(rail.months[1].fact, 150.0);
    assert_eq!(rail.months[0].carry_plan, 100.0);

    // 汽运+篷布车事实 = 发运汽运 + 发运篷布车
    let truck = rows
        .iter()
        .find(|r| r.row_key == "TRUCK_DISPATCH_TRUCK")
        .expect("缺少汽运行");
    assert_eq!(truck.months[2].fact, 10.0);

    // 仅事实行: 计划 / 结转 / 完成率全部为 0
    let weighing = rows
        .iter()
        .find(|r| r.row_key == "EXTRA_WEIGHING")
        .expect("缺少过磅行");
    assert!(!weighing.plan_tracked);
    assert_eq!(weighing.months[0].fact, 50.0);
    assert!(weighing
        .months
        .iter()
        .all(|m| m.base_plan == 0.0 && m.carry_plan == 0.0 && m.completion_pct == 0.0));
    assert_eq!(weighing.yearly_fact, 50.0);
    assert_eq!(weighing.yearly_completion_pct, 0.0);
}

#[test]
fn test_year_totals_is_read_only() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);

    env.state.plan_api.get_year_totals(2024).expect("年度合计失败");

    let plan = env
        .state
        .plan_repo
        .find_plan(env.segment_id(SegmentCode::Rail), 2024, 1)
        .expect("查询计划失败");
    assert!(plan.is_none());
}

#[tokio::test]
async fn test_year_totals_within_deadline_matches_sequential() {
    let env = TestEnv::new().expect("无法创建测试环境");
    rail_facts(&env);

    let sequential = env.state.plan_api.get_year_totals(2024).expect("年度合计失败");
    let concurrent = env
        .state
        .plan_api
        .clone()
        .get_year_totals_within(2024, Duration::from_secs(30))
        .await
        .expect("并发年度合计失败");

    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_year_totals_deadline_exceeded() {
    let env = TestEnv::new().expect("无法创建测试环境");

    // 另一个连接持有排他锁，报表读取只能等待
    let blocker = Connection::open(&env.db_path).expect("无法打开数据库");
    blocker.execute_batch("BEGIN EXCLUSIVE;").expect("获取排他锁失败");

    let result = env
        .state
        .plan_api
        .clone()
        .get_year_totals_within(2024, Duration::from_millis(200))
        .await;
    assert!(matches!(result, Err(ApiError::DeadlineExceeded(_))));

    blocker.execute_batch("ROLLBACK;").expect("释放排他锁失败");
}

// ==========================================
// 参数校验
// ==========================================

#[test]
fn test_update_base_plan_validation() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.plan_api;

    assert!(matches!(
        api.update_base_plan(2024, 13, "RAIL", "RAIL_PLAN", 1.0),
        Err(ApiError::InvalidPeriod(_))
    ));
    assert!(matches!(
        api.update_base_plan(2024, 1, "AIR_FREIGHT", "RAIL_PLAN", 1.0),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.update_base_plan(2024, 1, "RAIL", "UNKNOWN_PLAN", 1.0),
        Err(ApiError::NotFound(_))
    ));
    // 铁路没有汽运计划配对
    assert!(matches!(
        api.update_base_plan(2024, 1, "RAIL", "TRUCK_PLAN", 1.0),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", -5.0),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.update_base_plan(2024, 1, "RAIL", "RAIL_PLAN", f64::INFINITY),
        Err(ApiError::InvalidInput(_))
    ));

    // 校验失败不写入任何计划
    let plan = env
        .state
        .plan_repo
        .find_plan(env.segment_id(SegmentCode::Rail), 2024, 1)
        .expect("查询计划失败");
    assert!(plan.is_none());
}

#[test]
fn test_year_totals_invalid_year() {
    let env = TestEnv::new().expect("无法创建测试环境");
    assert!(matches!(
        env.state.plan_api.get_year_totals(2101),
        Err(ApiError::InvalidPeriod(_))
    ));
}
