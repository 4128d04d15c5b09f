use std::collections::BTreeSet;

use crate::models::{
    ConsolidatedSummary, FinancialFeed, FinancialMetrics, IndicatorRecord, MonthlyPoint,
    PeriodFilter, ProgramEntry, ProgramPerformance,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndicatorCounts {
    pub total: usize,
    pub monthly: usize,
}

impl IndicatorCounts {
    pub fn from_program(program: &ProgramEntry) -> Self {
        program
            .workstreams
            .iter()
            .flat_map(|workstream| workstream.indicators.iter())
            .fold(Self::default(), |mut counts, indicator| {
                counts.total += 1;
                if indicator.kind.as_deref() == Some("month") {
                    counts.monthly += 1;
                }
                counts
            })
    }

    pub fn from_records(records: &[IndicatorRecord], program_slug: &str) -> Self {
        let distinct: BTreeSet<(&str, &str)> = records
            .iter()
            .filter(|record| record.program_slug == program_slug)
            .map(|record| (record.project_slug.as_str(), record.indicator_name.as_str()))
            .collect();
        Self {
            total: distinct.len(),
            monthly: distinct.len(),
        }
    }
}

pub fn aggregate_program(
    program_slug: &str,
    series: &[MonthlyPoint],
    counts: IndicatorCounts,
) -> ProgramPerformance {
    let total_target: f64 = series.iter().map(|point| point.target).sum();
    let total_realized: f64 = series.iter().map(|point| point.realized).sum();

    let measured: Vec<f64> = series
        .iter()
        .filter(|point| point.target > 0.0)
        .map(|point| point.performance_pct)
        .collect();

    let has_activity = series
        .iter()
        .any(|point| point.target != 0.0 || point.realized != 0.0);

    ProgramPerformance {
        program_slug: program_slug.to_string(),
        total_target,
        total_realized,
        average_performance: mean(&measured),
        total_indicators: counts.total,
        monthly_indicators: counts.monthly,
        has_data: counts.total > 0 && has_activity,
        has_activity,
    }
}

pub fn aggregate_consolidated(
    programs: &[ProgramPerformance],
    financial_metrics: FinancialMetrics,
) -> ConsolidatedSummary {
    let with_data: Vec<f64> = programs
        .iter()
        .filter(|program| program.has_data)
        .map(|program| program.average_performance)
        .collect();

    ConsolidatedSummary {
        total_programs: programs.len(),
        programs_with_data: with_data.len(),
        total_indicators: programs.iter().map(|program| program.total_indicators).sum(),
        average_performance: mean(&with_data),
        financial_metrics,
    }
}

pub fn financial_metrics(feed: &FinancialFeed, filter: &PeriodFilter) -> FinancialMetrics {
    feed.dados_mensais
        .iter()
        .filter(|month| {
            month
                .period(filter.year())
                .is_some_and(|period| filter.contains(&period))
        })
        .fold(FinancialMetrics::default(), |mut metrics, month| {
            metrics.captado += month.captado;
            metrics.realizado += month.realizado;
            metrics.andamento += month.saldo;
            metrics
        })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
