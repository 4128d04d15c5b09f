use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use serde::Serialize;
use tracing::warn;

use crate::aggregate::{aggregate_consolidated, aggregate_program, financial_metrics, IndicatorCounts};
use crate::mask::{
    format_percent, mask, mask_currency, mask_number, masked_program, masked_series, masked_summary,
};
use crate::models::{
    ConsolidatedSummary, FinancialFeed, FinancialMetrics, IndicatorPerformance, IndicatorRecord,
    MonthlyPoint, PeriodFilter, ProgramFeed, ProgramPerformance,
};
use crate::query::QueryKey;
use crate::series::{build_all_series, build_series, financial_series, indicator_breakdown};

const WEAKEST_INDICATORS: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSection {
    pub name: Option<String>,
    pub performance: ProgramPerformance,
    pub series: Vec<MonthlyPoint>,
    pub indicators: Vec<IndicatorPerformance>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub label: String,
    pub year: i32,
    pub summary: ConsolidatedSummary,
    pub programs: Vec<ProgramSection>,
    pub financial_series: Option<Vec<MonthlyPoint>>,
}

impl DashboardReport {
    pub fn masked(&self, visible: bool) -> DashboardReport {
        DashboardReport {
            label: self.label.clone(),
            year: self.year,
            summary: masked_summary(&self.summary, visible),
            programs: self
                .programs
                .iter()
                .map(|section| ProgramSection {
                    name: section.name.clone(),
                    performance: masked_program(&section.performance, visible),
                    series: masked_series(&section.series, visible),
                    indicators: section
                        .indicators
                        .iter()
                        .map(|indicator| IndicatorPerformance {
                            target: mask(indicator.target, visible),
                            realized: mask(indicator.realized, visible),
                            ..indicator.clone()
                        })
                        .collect(),
                })
                .collect(),
            financial_series: self
                .financial_series
                .as_ref()
                .map(|series| masked_series(series, visible)),
        }
    }
}

pub fn build_dashboard(
    query: &QueryKey,
    records: &[IndicatorRecord],
    catalog: Option<&ProgramFeed>,
    financial: Option<&FinancialFeed>,
) -> DashboardReport {
    let year = query.period.year();
    let catalog_entries: BTreeMap<&str, _> = catalog
        .map(|feed| {
            feed.programs
                .iter()
                .map(|program| (program.slug.as_str(), program))
                .collect()
        })
        .unwrap_or_default();

    // The departamento only narrows records through the catalog fetched for it.
    let scoped = query.scope.is_some() && catalog.is_some();
    if query.scope.is_some() && !scoped {
        warn!("no program catalog for the departamento; reporting every program");
    }
    let label = if scoped || query.scope.is_none() {
        query.label()
    } else {
        query.period.to_string()
    };

    let yearly: Vec<IndicatorRecord> = records
        .iter()
        .filter(|record| !scoped || catalog_entries.contains_key(record.program_slug.as_str()))
        .filter(|record| record.period.is_some_and(|period| period.year == year))
        .cloned()
        .collect();
    let in_period: Vec<IndicatorRecord> = yearly
        .iter()
        .filter(|record| record.period.is_some_and(|period| query.period.contains(&period)))
        .cloned()
        .collect();

    let mut all_series = build_all_series(&yearly, year);
    let slugs: BTreeSet<&str> = in_period
        .iter()
        .map(|record| record.program_slug.as_str())
        .chain(catalog_entries.keys().copied())
        .collect();

    let programs: Vec<ProgramSection> = slugs
        .into_iter()
        .map(|slug| {
            let series = all_series
                .remove(slug)
                .unwrap_or_else(|| build_series(&[], slug, year));
            let counts = match catalog_entries.get(slug) {
                Some(entry) => IndicatorCounts::from_program(entry),
                None => IndicatorCounts::from_records(&in_period, slug),
            };
            ProgramSection {
                name: catalog_entries.get(slug).and_then(|entry| entry.name.clone()),
                performance: aggregate_program(slug, included_months(&series, &query.period), counts),
                indicators: indicator_breakdown(&in_period, slug, &query.period),
                series,
            }
        })
        .collect();

    let metrics = financial
        .map(|feed| financial_metrics(feed, &query.period))
        .unwrap_or_default();
    let performances: Vec<ProgramPerformance> = programs
        .iter()
        .map(|section| section.performance.clone())
        .collect();

    DashboardReport {
        label,
        year,
        summary: aggregate_consolidated(&performances, metrics),
        programs,
        financial_series: financial.map(|feed| financial_series(feed, year)),
    }
}

pub fn render_json(report: &DashboardReport, visible: bool) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&report.masked(visible))
}

pub fn render_markdown(report: &DashboardReport, visible: bool) -> String {
    let view = report.masked(visible);
    let summary = &view.summary;
    let money = report.summary.financial_metrics;
    let mut output = String::new();

    let _ = writeln!(output, "# Painel de Indicadores");
    let _ = writeln!(output, "Período: {}", view.label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Visão Consolidada");
    let _ = writeln!(
        output,
        "- Programas: {} ({} com dados)",
        summary.total_programs, summary.programs_with_data
    );
    let _ = writeln!(output, "- Indicadores: {}", summary.total_indicators);
    let _ = writeln!(
        output,
        "- Desempenho médio: {}",
        format_percent(summary.average_performance)
    );
    write_financials(&mut output, &money, visible);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Programas");
    if view.programs.is_empty() {
        let _ = writeln!(output, "Nenhum programa com registros neste período.");
    }
    for section in &view.programs {
        let performance = &section.performance;
        let title = section.name.as_deref().unwrap_or(&performance.program_slug);
        let _ = writeln!(output);
        let _ = writeln!(output, "### {title}");
        if performance.total_indicators == 0 {
            let _ = writeln!(output, "Sem indicadores cadastrados.");
            continue;
        }
        if !performance.has_data {
            let _ = writeln!(output, "Sem lançamentos no período.");
            continue;
        }
        let _ = writeln!(
            output,
            "- Desempenho médio: {} ({} indicadores, {} mensais)",
            format_percent(performance.average_performance),
            performance.total_indicators,
            performance.monthly_indicators
        );
        let _ = writeln!(
            output,
            "- Meta total: {} | Realizado total: {}",
            mask_number(performance.total_target, visible),
            mask_number(performance.total_realized, visible)
        );
        write_series(&mut output, &section.series, visible, false);

        if !section.indicators.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "Indicadores com menor desempenho:");
            for indicator in section.indicators.iter().take(WEAKEST_INDICATORS) {
                let _ = writeln!(
                    output,
                    "- {} / {}: {} ({})",
                    indicator.project_slug,
                    indicator.indicator_name,
                    format_percent(indicator.performance_pct),
                    indicator.band.label()
                );
            }
        }
    }

    if let Some(series) = &report.financial_series {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Captação Mensal");
        write_series(&mut output, series, visible, true);
    }

    output
}

fn write_financials(output: &mut String, money: &FinancialMetrics, visible: bool) {
    let _ = writeln!(output, "- Captado: {}", mask_currency(money.captado, visible));
    let _ = writeln!(output, "- Realizado: {}", mask_currency(money.realizado, visible));
    let _ = writeln!(output, "- Em andamento: {}", mask_currency(money.andamento, visible));
}

fn write_series(output: &mut String, series: &[MonthlyPoint], visible: bool, currency: bool) {
    let _ = writeln!(output);
    let _ = writeln!(output, "| Mês | Meta | Realizado | Desempenho |");
    let _ = writeln!(output, "|-----|------|-----------|------------|");
    for point in series {
        let (target, realized) = if currency {
            (
                mask_currency(point.target, visible),
                mask_currency(point.realized, visible),
            )
        } else {
            (
                mask_number(point.target, visible),
                mask_number(point.realized, visible),
            )
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            point.month,
            target,
            realized,
            format_percent(point.performance_pct)
        );
    }
}

fn included_months<'a>(series: &'a [MonthlyPoint], period: &PeriodFilter) -> &'a [MonthlyPoint] {
    match period {
        PeriodFilter::Year(_) => series,
        PeriodFilter::Month(month) => {
            let index = month.month_index();
            series.get(index..=index).unwrap_or(series)
        }
    }
}
