use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    FinancialFeed, IndicatorPerformance, IndicatorRecord, MonthlyPoint, PeriodFilter,
    MONTH_LABELS,
};
use crate::performance::{compute_performance, PerformanceBand};

/// Twelve points, January to December, for one program and year.
pub fn build_series(records: &[IndicatorRecord], program_slug: &str, year: i32) -> Vec<MonthlyPoint> {
    let mut totals = [(0.0f64, 0.0f64); 12];

    for record in records {
        if record.program_slug != program_slug {
            continue;
        }
        let Some(period) = record.period else {
            continue;
        };
        if period.year != year {
            continue;
        }

        let slot = &mut totals[period.month_index()];
        slot.0 += record.target_value.unwrap_or(0.0);
        slot.1 += record.actual_value.unwrap_or(0.0);
    }

    to_points(&totals)
}

pub fn build_all_series(
    records: &[IndicatorRecord],
    year: i32,
) -> BTreeMap<String, Vec<MonthlyPoint>> {
    let programs: BTreeSet<&str> = records
        .iter()
        .map(|record| record.program_slug.as_str())
        .collect();

    programs
        .into_iter()
        .map(|program| (program.to_string(), build_series(records, program, year)))
        .collect()
}

pub fn financial_series(feed: &FinancialFeed, year: i32) -> Vec<MonthlyPoint> {
    let mut totals = [(0.0f64, 0.0f64); 12];

    for month in &feed.dados_mensais {
        let Some(period) = month.period(year) else {
            continue;
        };
        if period.year != year {
            continue;
        }
        let slot = &mut totals[period.month_index()];
        slot.0 += month.meta_captado;
        slot.1 += month.captado;
    }

    to_points(&totals)
}

/// Per project and indicator figures for one program, weakest first.
pub fn indicator_breakdown(
    records: &[IndicatorRecord],
    program_slug: &str,
    filter: &PeriodFilter,
) -> Vec<IndicatorPerformance> {
    let mut grouped: BTreeMap<(&str, &str), (f64, f64)> = BTreeMap::new();

    for record in records {
        if record.program_slug != program_slug {
            continue;
        }
        match record.period {
            Some(period) if filter.contains(&period) => {}
            _ => continue,
        }
        let entry = grouped
            .entry((record.project_slug.as_str(), record.indicator_name.as_str()))
            .or_insert((0.0, 0.0));
        entry.0 += record.target_value.unwrap_or(0.0);
        entry.1 += record.actual_value.unwrap_or(0.0);
    }

    let mut breakdown: Vec<IndicatorPerformance> = grouped
        .into_iter()
        .map(|((project, indicator), (target, realized))| IndicatorPerformance {
            project_slug: project.to_string(),
            indicator_name: indicator.to_string(),
            target,
            realized,
            performance_pct: compute_performance(target, realized),
            band: PerformanceBand::classify(target, realized),
        })
        .collect();

    breakdown.sort_by(|a, b| {
        a.performance_pct
            .total_cmp(&b.performance_pct)
            .then_with(|| a.indicator_name.cmp(&b.indicator_name))
            .then_with(|| a.project_slug.cmp(&b.project_slug))
    });
    breakdown
}

fn to_points(totals: &[(f64, f64); 12]) -> Vec<MonthlyPoint> {
    totals
        .iter()
        .zip(MONTH_LABELS)
        .map(|(&(target, realized), label)| MonthlyPoint {
            month: label.to_string(),
            target,
            realized,
            performance_pct: compute_performance(target, realized),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialMonth, Period, Scope};
    use proptest::prelude::*;

    fn record(program: &str, period: &str, target: f64, actual: f64) -> IndicatorRecord {
        IndicatorRecord {
            program_slug: program.to_string(),
            project_slug: program.to_string(),
            indicator_name: "Frequência".to_string(),
            period: period.parse::<Period>().ok(),
            scope: Scope::Monthly,
            target_value: Some(target),
            actual_value: Some(actual),
        }
    }

    #[test]
    fn empty_input_gives_twelve_zero_points() {
        let series = build_series(&[], "any", 2025);
        assert_eq!(series.len(), 12);
        assert!(series
            .iter()
            .all(|p| p.target == 0.0 && p.realized == 0.0 && p.performance_pct == 0.0));
        assert_eq!(series[0].month, "Jan");
        assert_eq!(series[11].month, "Dez");
    }

    #[test]
    fn single_record_lands_in_its_month() {
        let records = vec![record("casa_sonhar", "2025-09", 120.0, 125.0)];
        let series = build_series(&records, "casa_sonhar", 2025);

        let september = &series[8];
        assert_eq!(september.month, "Set");
        assert_eq!(september.target, 120.0);
        assert_eq!(september.realized, 125.0);
        assert!((september.performance_pct - 104.166_666_666_666_67).abs() < 1e-9);

        let others = series
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 8)
            .all(|(_, p)| p.target == 0.0 && p.realized == 0.0 && p.performance_pct == 0.0);
        assert!(others);
    }

    #[test]
    fn same_month_records_are_summed() {
        let records = vec![
            record("casa_sonhar", "2025-04", 50.0, 40.0),
            record("casa_sonhar", "2025-04", 50.0, 45.0),
        ];
        let april = &build_series(&records, "casa_sonhar", 2025)[3];
        assert_eq!(april.target, 100.0);
        assert_eq!(april.realized, 85.0);
        assert_eq!(april.performance_pct, 85.0);
    }

    #[test]
    fn filters_by_program_and_year() {
        let mut undated = record("casa_sonhar", "2025-01", 10.0, 10.0);
        undated.period = None;
        let records = vec![
            record("casa_sonhar", "2024-01", 10.0, 10.0),
            record("educacao", "2025-01", 10.0, 10.0),
            undated,
        ];
        let series = build_series(&records, "casa_sonhar", 2025);
        assert!(series.iter().all(|p| p.target == 0.0 && p.realized == 0.0));
    }

    #[test]
    fn missing_values_count_as_zero() {
        let mut partial = record("casa_sonhar", "2025-02", 0.0, 30.0);
        partial.target_value = None;
        let february = &build_series(&[partial], "casa_sonhar", 2025)[1];
        assert_eq!(february.target, 0.0);
        assert_eq!(february.realized, 30.0);
        assert_eq!(february.performance_pct, 0.0);
    }

    #[test]
    fn builds_one_series_per_program() {
        let records = vec![
            record("educacao", "2025-01", 10.0, 5.0),
            record("casa_sonhar", "2025-01", 10.0, 10.0),
        ];
        let all = build_all_series(&records, 2025);
        let keys: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["casa_sonhar", "educacao"]);
        assert_eq!(all["educacao"][0].performance_pct, 50.0);
    }

    #[test]
    fn financial_series_uses_meta_captado_and_captado() {
        let feed = FinancialFeed {
            dados_mensais: vec![
                FinancialMonth {
                    mes: "2025-02".to_string(),
                    meta_captado: 1000.0,
                    captado: 750.0,
                    ..Default::default()
                },
                FinancialMonth {
                    mes: "Mar".to_string(),
                    meta_captado: 500.0,
                    captado: 600.0,
                    ..Default::default()
                },
                FinancialMonth {
                    mes: "2024-02".to_string(),
                    meta_captado: 999.0,
                    captado: 999.0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let series = financial_series(&feed, 2025);
        assert_eq!(series.len(), 12);
        assert_eq!(series[1].performance_pct, 75.0);
        assert_eq!(series[2].performance_pct, 120.0);
        assert_eq!(series[0].target, 0.0);
    }

    #[test]
    fn breakdown_orders_weakest_first() {
        let mut nps = record("casa_sonhar", "2025-05", 100.0, 95.0);
        nps.indicator_name = "NPS".to_string();
        let records = vec![
            record("casa_sonhar", "2025-05", 100.0, 40.0),
            record("casa_sonhar", "2025-06", 100.0, 50.0),
            nps,
            record("educacao", "2025-05", 100.0, 0.0),
        ];

        let year = build_breakdown(&records, "2025");
        assert_eq!(year.len(), 2);
        assert_eq!(year[0].indicator_name, "Frequência");
        assert_eq!(year[0].target, 200.0);
        assert_eq!(year[0].performance_pct, 45.0);
        assert_eq!(year[0].band, PerformanceBand::Critical);
        assert_eq!(year[1].band, PerformanceBand::Attention);

        let may = build_breakdown(&records, "2025-05");
        assert_eq!(may[0].target, 100.0);
    }

    fn build_breakdown(records: &[IndicatorRecord], filter: &str) -> Vec<IndicatorPerformance> {
        let filter: PeriodFilter = filter.parse().unwrap();
        indicator_breakdown(records, "casa_sonhar", &filter)
    }

    proptest! {
        #[test]
        fn series_always_has_twelve_months(
            entries in prop::collection::vec((1u32..=12, 0.0f64..1e6, 0.0f64..1e6), 0..40),
            year in 2000i32..2100,
        ) {
            let records: Vec<IndicatorRecord> = entries
                .iter()
                .map(|(month, target, actual)| {
                    record("casa_sonhar", &format!("{year}-{month:02}"), *target, *actual)
                })
                .collect();
            let series = build_series(&records, "casa_sonhar", year);
            prop_assert_eq!(series.len(), 12);
            prop_assert!(series.iter().all(|p| p.performance_pct.is_finite()));
        }

        #[test]
        fn series_ignores_input_order(
            entries in prop::collection::vec((1u32..=12, 0u32..1000, 0u32..1000), 0..20),
        ) {
            let records: Vec<IndicatorRecord> = entries
                .iter()
                .map(|(month, target, actual)| {
                    record("casa_sonhar", &format!("2025-{month:02}"), *target as f64, *actual as f64)
                })
                .collect();
            let mut reversed = records.clone();
            reversed.reverse();
            prop_assert_eq!(
                build_series(&records, "casa_sonhar", 2025),
                build_series(&reversed, "casa_sonhar", 2025)
            );
        }
    }
}
