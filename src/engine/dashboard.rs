// ==========================================
// 物流运营报表系统 - 驾驶舱 KPI 计算引擎
// ==========================================
// 职责: 由已构建的板块月报 + 月度计划投影出板块 KPI
// 公共量:
// - dataDays   = max(1, min(月天数, 已完成天数 + 1))
// - planToDate = 月计划 / 月天数 × 已完成天数
// - pct(a, b)  = b <= 0 ? 0 : a / b × 100
// 红线: 纯投影，不修改输入
// ==========================================

use crate::domain::catalog::metric_codes as mc;
use crate::domain::period::data_days;
use crate::domain::report::{
    ContainerKpis, DashboardKpis, DashboardWindow, ExtraCategoryKpi, ExtraServicesKpis,
    PlanTrackKpis, SegmentDashboard, SegmentReport, SummaryRow, TruckDispatchKpis,
    WaitingSnapshot,
};
use crate::domain::types::{PlanMetricCode, SegmentKind};
use crate::engine::series::{add_series, average_known, last_known, sum_window};

/// 完成率（分母 <= 0 时为 0）
pub fn completion_pct(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// 直线分摊的累计计划
pub fn plan_to_date(plan_month: f64, days_in_month: usize, completed_days: usize) -> f64 {
    if days_in_month == 0 {
        return 0.0;
    }
    plan_month / days_in_month as f64 * completed_days as f64
}

// ==========================================
// DashboardKpiCalculator - 驾驶舱 KPI 计算引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct DashboardKpiCalculator;

impl DashboardKpiCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn window(&self, report: &SegmentReport) -> DashboardWindow {
        DashboardWindow {
            days_in_month: report.days_in_month,
            completed_days: report.completed_days,
            data_days: data_days(report.days_in_month, report.completed_days),
        }
    }

    /// 计算板块驾驶舱
    pub fn calculate(&self, report: &SegmentReport) -> SegmentDashboard {
        let window = self.window(report);
        let kpis = match report.segment_code.kind() {
            SegmentKind::Container => DashboardKpis::Container(self.container(report, &window)),
            SegmentKind::TruckDispatch => {
                DashboardKpis::TruckDispatch(self.truck_dispatch(report, &window))
            }
            SegmentKind::Rail => DashboardKpis::Rail(self.track(
                report.plan_month(PlanMetricCode::RailPlan),
                report.day_values(mc::RAIL_TOTAL).unwrap_or(&[]),
                &window,
            )),
            SegmentKind::Maintenance => DashboardKpis::Maintenance(self.track(
                report.plan_month(PlanMetricCode::MaintenancePlan),
                report.day_values(mc::MAINTENANCE_TOTAL).unwrap_or(&[]),
                &window,
            )),
            SegmentKind::ExtraServices => {
                DashboardKpis::ExtraServices(self.extra_services(report, &window))
            }
        };
        SegmentDashboard { window, kpis }
    }

    /// 单条计划/实际轨道
    pub fn track(&self, plan_month: f64, fact: &[Option<f64>], window: &DashboardWindow) -> PlanTrackKpis {
        let plan_to_date = plan_to_date(plan_month, window.days_in_month, window.completed_days);
        let fact_to_date = sum_window(fact, window.data_days);
        let fact_month = sum_window(fact, fact.len());

        PlanTrackKpis {
            plan_month,
            plan_to_date,
            fact_to_date,
            fact_month,
            completion_to_date_pct: completion_pct(fact_to_date, plan_to_date),
            completion_month_pct: completion_pct(fact_month, plan_month),
            avg_per_day: fact_to_date / window.data_days as f64,
            deviation_to_date: fact_to_date - plan_to_date,
        }
    }

    /// 两条轨道合并（计划与实际分别相加，完成率重新计算）
    fn combine(&self, a: &PlanTrackKpis, b: &PlanTrackKpis, window: &DashboardWindow) -> PlanTrackKpis {
        let plan_month = a.plan_month + b.plan_month;
        let plan_to_date = a.plan_to_date + b.plan_to_date;
        let fact_to_date = a.fact_to_date + b.fact_to_date;
        let fact_month = a.fact_month + b.fact_month;
        PlanTrackKpis {
            plan_month,
            plan_to_date,
            fact_to_date,
            fact_month,
            completion_to_date_pct: completion_pct(fact_to_date, plan_to_date),
            completion_month_pct: completion_pct(fact_month, plan_month),
            avg_per_day: fact_to_date / window.data_days as f64,
            deviation_to_date: fact_to_date - plan_to_date,
        }
    }

    fn container(&self, report: &SegmentReport, window: &DashboardWindow) -> ContainerKpis {
        let track = self.track(
            report.plan_month(PlanMetricCode::ContainerRequestVolume),
            report.day_values(mc::FACT_TOTAL_PER_DAY).unwrap_or(&[]),
            window,
        );

        let gross = report.day_values(mc::GROSS_VALUE).unwrap_or(&[]);
        let gross_value_to_date = sum_window(gross, window.data_days);

        let vehicles = report.day_values(mc::VEHICLES_ON_LINE).unwrap_or(&[]);
        let vehicles_window = &vehicles[..window.data_days.min(vehicles.len())];

        ContainerKpis {
            track,
            gross_value_to_date,
            gross_value_month: sum_window(gross, gross.len()),
            gross_value_avg_per_day: gross_value_to_date / window.data_days as f64,
            vehicles_on_line_avg: average_known(vehicles_window),
        }
    }

    fn truck_dispatch(&self, report: &SegmentReport, window: &DashboardWindow) -> TruckDispatchKpis {
        let series = |code: &str| report.day_values(code).unwrap_or(&[]);
        // 截止窗口内的最近值
        let snapshot = |code: &str| {
            let s = series(code);
            last_known(&s[..window.data_days.min(s.len())])
        };

        let truck_curtain_fact = add_series(series(mc::SENT_TRUCK), series(mc::SENT_CURTAIN));
        let truck_curtain = self.track(
            report.plan_month(PlanMetricCode::TruckPlan),
            &truck_curtain_fact,
            window,
        );
        let container_in_truck = self.track(
            report.plan_month(PlanMetricCode::ContainerInTruckPlan),
            series(mc::SENT_CIT),
            window,
        );
        let combined = self.combine(&truck_curtain, &container_in_truck, window);

        TruckDispatchKpis {
            truck_curtain,
            container_in_truck,
            combined,
            waiting: WaitingSnapshot {
                truck: snapshot(mc::WAITING_TRUCK),
                container_in_truck: snapshot(mc::WAITING_CIT),
                curtain: snapshot(mc::WAITING_CURTAIN),
                total: snapshot(mc::WAITING_TOTAL),
            },
            debt_receivable: snapshot(mc::DEBT_RECEIVABLE),
            debt_payable: snapshot(mc::DEBT_PAYABLE),
        }
    }

    fn extra_services(&self, report: &SegmentReport, window: &DashboardWindow) -> ExtraServicesKpis {
        let categories: Vec<ExtraCategoryKpi> = mc::EXTRA_CATEGORIES
            .iter()
            .filter_map(|code| report.row(code))
            .map(|row| ExtraCategoryKpi {
                metric_code: row.metric_code.clone(),
                metric_name: row.metric_name.clone(),
                fact_to_date: sum_window(&row.day_values, window.data_days),
                fact_month: sum_window(&row.day_values, row.day_values.len()),
            })
            .collect();

        ExtraServicesKpis {
            total_to_date: categories.iter().map(|c| c.fact_to_date).sum(),
            total_month: categories.iter().map(|c| c.fact_month).sum(),
            categories,
        }
    }

    /// 跨板块汇总行
    ///
    /// - 非明细: 每个板块一行（汽运取合并轨道，附加服务取合计）
    /// - 明细: 额外输出汽运两条轨道与附加服务各分类
    pub fn summary_rows(
        &self,
        report: &SegmentReport,
        dashboard: &SegmentDashboard,
        detailed: bool,
    ) -> Vec<SummaryRow> {
        let plan_row = |detail: Option<&str>, t: &PlanTrackKpis| SummaryRow {
            segment_code: report.segment_code,
            segment_name: report.segment_name.clone(),
            detail: detail.map(|d| d.to_string()),
            plan_month: Some(t.plan_month),
            plan_to_date: Some(t.plan_to_date),
            fact_to_date: t.fact_to_date,
            fact_month: t.fact_month,
            completion_to_date_pct: Some(t.completion_to_date_pct),
            completion_month_pct: Some(t.completion_month_pct),
            avg_per_day: t.avg_per_day,
        };
        let data_days = dashboard.window.data_days as f64;
        let fact_row = |detail: Option<&str>, to_date: f64, month: f64| SummaryRow {
            segment_code: report.segment_code,
            segment_name: report.segment_name.clone(),
            detail: detail.map(|d| d.to_string()),
            plan_month: None,
            plan_to_date: None,
            fact_to_date: to_date,
            fact_month: month,
            completion_to_date_pct: None,
            completion_month_pct: None,
            avg_per_day: to_date / data_days,
        };

        match &dashboard.kpis {
            DashboardKpis::Container(k) => vec![plan_row(None, &k.track)],
            DashboardKpis::Rail(t) | DashboardKpis::Maintenance(t) => vec![plan_row(None, t)],
            DashboardKpis::TruckDispatch(k) => {
                let mut rows = vec![plan_row(None, &k.combined)];
                if detailed {
                    rows.push(plan_row(Some("汽运+篷布车"), &k.truck_curtain));
                    rows.push(plan_row(Some("集装箱汽运"), &k.container_in_truck));
                }
                rows
            }
            DashboardKpis::ExtraServices(k) => {
                let mut rows = vec![fact_row(None, k.total_to_date, k.total_month)];
                if detailed {
                    rows.extend(k.categories.iter().map(|c| {
                        fact_row(Some(c.metric_name.as_str()), c.fact_to_date, c.fact_month)
                    }));
                }
                rows
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{GridRow, PlanSnapshot};
    use crate::domain::types::{Aggregation, SegmentCode, ValueType};
    use chrono::NaiveDate;

    fn row(code: &str, day_values: Vec<Option<f64>>) -> GridRow {
        GridRow {
            metric_code: code.to_string(),
            metric_name: code.to_string(),
            value_type: ValueType::Integer,
            aggregation: Aggregation::Sum,
            is_editable: true,
            day_values,
            month_total: None,
        }
    }

    fn report(
        code: SegmentCode,
        days: usize,
        completed: usize,
        grid: Vec<GridRow>,
        plans: Vec<PlanSnapshot>,
    ) -> SegmentReport {
        SegmentReport {
            segment_code: code,
            segment_name: code.to_string(),
            year: 2023,
            month: 2,
            as_of: NaiveDate::from_ymd_opt(2023, 2, completed as u32 + 1).unwrap(),
            days_in_month: days,
            completed_days: completed,
            grid,
            plans,
        }
    }

    fn padded(prefix: &[Option<f64>], days: usize) -> Vec<Option<f64>> {
        let mut v = prefix.to_vec();
        v.resize(days, None);
        v
    }

    #[test]
    fn test_completion_pct_zero_whole() {
        assert_eq!(completion_pct(10.0, 0.0), 0.0);
        assert_eq!(completion_pct(10.0, -5.0), 0.0);
        assert_eq!(completion_pct(5.0, 10.0), 50.0);
    }

    #[test]
    fn test_container_end_to_end_scenario() {
        let fact = padded(&[Some(10.0), Some(20.0), Some(30.0)], 28);
        let r = report(
            SegmentCode::ContainerEast,
            28,
            3,
            vec![row(mc::FACT_TOTAL_PER_DAY, fact)],
            vec![PlanSnapshot {
                plan_metric_code: PlanMetricCode::ContainerRequestVolume,
                base_plan: 280.0,
                carry_plan: None,
            }],
        );

        let dashboard = DashboardKpiCalculator::new().calculate(&r);
        assert_eq!(dashboard.window.data_days, 4);
        let DashboardKpis::Container(k) = dashboard.kpis else {
            panic!("expected container kpis");
        };
        assert!((k.track.plan_to_date - 30.0).abs() < 1e-9);
        assert_eq!(k.track.fact_to_date, 60.0);
        assert!((k.track.completion_to_date_pct - 200.0).abs() < 1e-9);
        assert_eq!(k.track.avg_per_day, 15.0);
        assert_eq!(k.vehicles_on_line_avg, None);
    }

    #[test]
    fn test_first_day_proration_boundary() {
        let r = report(
            SegmentCode::Rail,
            30,
            0,
            vec![row(mc::RAIL_TOTAL, padded(&[Some(7.0)], 30))],
            vec![PlanSnapshot {
                plan_metric_code: PlanMetricCode::RailPlan,
                base_plan: 300.0,
                carry_plan: Some(330.0),
            }],
        );

        let dashboard = DashboardKpiCalculator::new().calculate(&r);
        assert_eq!(dashboard.window.data_days, 1);
        let DashboardKpis::Rail(t) = dashboard.kpis else {
            panic!("expected rail kpis");
        };
        assert_eq!(t.plan_month, 330.0);
        assert_eq!(t.plan_to_date, 0.0);
        assert_eq!(t.fact_to_date, 7.0);
        assert_eq!(t.completion_to_date_pct, 0.0);
    }

    #[test]
    fn test_truck_dispatch_tracks_and_snapshots() {
        let days = 30;
        let r = report(
            SegmentCode::TruckDispatch,
            days,
            2,
            vec![
                row(mc::SENT_TRUCK, padded(&[Some(4.0), Some(6.0), Some(100.0)], days)),
                row(mc::SENT_CURTAIN, padded(&[None, Some(2.0)], days)),
                row(mc::SENT_CIT, padded(&[Some(1.0), Some(1.0), Some(1.0)], days)),
                row(mc::WAITING_TRUCK, padded(&[Some(9.0), Some(8.0), Some(7.0), Some(1.0)], days)),
                row(mc::DEBT_PAYABLE, padded(&[Some(50.0), None, None, Some(10.0)], days)),
            ],
            vec![
                PlanSnapshot {
                    plan_metric_code: PlanMetricCode::TruckPlan,
                    base_plan: 300.0,
                    carry_plan: None,
                },
                PlanSnapshot {
                    plan_metric_code: PlanMetricCode::ContainerInTruckPlan,
                    base_plan: 60.0,
                    carry_plan: None,
                },
            ],
        );

        let dashboard = DashboardKpiCalculator::new().calculate(&r);
        let DashboardKpis::TruckDispatch(k) = dashboard.kpis.clone() else {
            panic!("expected truck kpis");
        };
        assert_eq!(k.truck_curtain.fact_to_date, 112.0);
        assert_eq!(k.truck_curtain.plan_to_date, 20.0);
        assert_eq!(k.container_in_truck.fact_to_date, 3.0);
        assert_eq!(k.combined.plan_month, 360.0);
        assert_eq!(k.combined.fact_to_date, 115.0);
        assert_eq!(k.waiting.truck, Some(7.0));
        assert_eq!(k.waiting.curtain, None);
        assert_eq!(k.debt_payable, Some(50.0));
        assert_eq!(k.debt_receivable, None);

        let calc = DashboardKpiCalculator::new();
        assert_eq!(calc.summary_rows(&r, &dashboard, false).len(), 1);
        let detailed = calc.summary_rows(&r, &dashboard, true);
        assert_eq!(detailed.len(), 3);
        assert_eq!(detailed[1].detail.as_deref(), Some("汽运+篷布车"));
    }

    #[test]
    fn test_extra_services_fact_only() {
        let days = 31;
        let r = report(
            SegmentCode::ExtraServices,
            days,
            1,
            vec![
                row(mc::EXTRA_WEIGHING, padded(&[Some(100.0), Some(50.0), Some(25.0)], days)),
                row(mc::EXTRA_CLEANING, padded(&[None, Some(10.0)], days)),
            ],
            vec![],
        );

        let calc = DashboardKpiCalculator::new();
        let dashboard = calc.calculate(&r);
        let DashboardKpis::ExtraServices(k) = dashboard.kpis.clone() else {
            panic!("expected extra services kpis");
        };
        assert_eq!(k.categories.len(), 2);
        assert_eq!(k.total_to_date, 160.0);
        assert_eq!(k.total_month, 185.0);

        let rows = calc.summary_rows(&r, &dashboard, true);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.plan_month.is_none()));
        assert_eq!(rows[0].avg_per_day, 80.0);
    }
}
