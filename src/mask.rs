use crate::models::{ConsolidatedSummary, FinancialMetrics, MonthlyPoint, ProgramPerformance};

pub const HIDDEN_PLACEHOLDER: &str = "•••";

pub fn mask(value: f64, visible: bool) -> f64 {
    if visible {
        value
    } else {
        0.0
    }
}

pub fn mask_currency(value: f64, visible: bool) -> String {
    if visible {
        format_currency(value)
    } else {
        HIDDEN_PLACEHOLDER.to_string()
    }
}

pub fn mask_number(value: f64, visible: bool) -> String {
    if visible {
        format!("{value:.0}")
    } else {
        HIDDEN_PLACEHOLDER.to_string()
    }
}

pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}R$ {},{:02}",
        group_thousands(cents / 100),
        cents % 100
    )
}

pub fn format_percent(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.1}%").replace('.', ",")
}

pub fn masked_program(program: &ProgramPerformance, visible: bool) -> ProgramPerformance {
    ProgramPerformance {
        total_target: mask(program.total_target, visible),
        total_realized: mask(program.total_realized, visible),
        ..program.clone()
    }
}

pub fn masked_summary(summary: &ConsolidatedSummary, visible: bool) -> ConsolidatedSummary {
    let metrics = summary.financial_metrics;
    ConsolidatedSummary {
        financial_metrics: FinancialMetrics {
            captado: mask(metrics.captado, visible),
            realizado: mask(metrics.realizado, visible),
            andamento: mask(metrics.andamento, visible),
        },
        ..summary.clone()
    }
}

pub fn masked_series(series: &[MonthlyPoint], visible: bool) -> Vec<MonthlyPoint> {
    series
        .iter()
        .map(|point| MonthlyPoint {
            target: mask(point.target, visible),
            realized: mask(point.realized, visible),
            ..point.clone()
        })
        .collect()
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_brazilian_currency() {
        assert_eq!(format_currency(1234.56), "R$ 1.234,56");
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(999.999), "R$ 1.000,00");
        assert_eq!(format_currency(-1500.5), "-R$ 1.500,50");
        assert_eq!(format_currency(1_234_567.0), "R$ 1.234.567,00");
        assert_eq!(format_currency(f64::NAN), "R$ 0,00");
        assert_eq!(format_currency(-0.001), "R$ 0,00");
    }

    #[test]
    fn formats_percentages_with_comma() {
        assert_eq!(format_percent(104.1666), "104,2%");
        assert_eq!(format_percent(0.0), "0,0%");
    }

    #[test]
    fn hidden_currency_uses_placeholder() {
        assert_eq!(mask_currency(1234.56, false), "•••");
        assert_eq!(mask_currency(1234.56, true), "R$ 1.234,56");
    }

    #[test]
    fn hidden_numbers_use_placeholder() {
        assert_eq!(mask_number(120.0, true), "120");
        assert_eq!(mask_number(120.0, false), "•••");
        assert_eq!(mask_number(0.0, false), HIDDEN_PLACEHOLDER);
    }

    #[test]
    fn masking_a_copy_leaves_the_shared_aggregate_intact() {
        let summary = ConsolidatedSummary {
            total_programs: 2,
            programs_with_data: 1,
            total_indicators: 4,
            average_performance: 87.5,
            financial_metrics: FinancialMetrics {
                captado: 5000.0,
                realizado: 3000.0,
                andamento: 2000.0,
            },
        };

        let hidden = masked_summary(&summary, false);
        assert_eq!(hidden.financial_metrics, FinancialMetrics::default());
        assert_eq!(hidden.average_performance, 87.5);
        assert_eq!(summary.financial_metrics.captado, 5000.0);
        assert_eq!(masked_summary(&summary, true), summary);
    }

    #[test]
    fn masked_program_keeps_percentages() {
        let program = ProgramPerformance {
            program_slug: "casa_sonhar".to_string(),
            total_target: 200.0,
            total_realized: 180.0,
            average_performance: 75.0,
            total_indicators: 2,
            monthly_indicators: 2,
            has_data: true,
            has_activity: true,
        };
        let hidden = masked_program(&program, false);
        assert_eq!(hidden.total_target, 0.0);
        assert_eq!(hidden.average_performance, 75.0);
        assert_eq!(program.total_target, 200.0);
    }

    proptest! {
        #[test]
        fn mask_law(x in -1e12f64..1e12) {
            prop_assert_eq!(mask(x, true), x);
            prop_assert_eq!(mask(x, false), 0.0);
        }

        #[test]
        fn currency_never_fails(x in -1e12f64..=0.0) {
            prop_assert!(mask_currency(x, true).contains("R$"));
            prop_assert_eq!(mask_currency(x, false), HIDDEN_PLACEHOLDER);
        }
    }
}
