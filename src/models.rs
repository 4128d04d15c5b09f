use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::normalize::lenient_f64;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

/// A calendar month, always rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|date| Self {
            year: date.year(),
            month: date.month(),
        })
    }

    pub fn month_index(&self) -> usize {
        (self.month.clamp(1, 12) - 1) as usize
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(Self {
                year: date.year(),
                month: date.month(),
            });
        }

        let parts = if let Some((year, month)) = value.split_once('-') {
            Some((year, month))
        } else {
            value.split_once('/').map(|(month, year)| (year, month))
        };

        let (year, month) = parts.ok_or_else(|| format!("unrecognized period {value:?}"))?;
        let year: i32 = year
            .trim()
            .parse()
            .map_err(|_| format!("invalid year in period {value:?}"))?;
        let month: u32 = month
            .trim()
            .parse()
            .map_err(|_| format!("invalid month in period {value:?}"))?;
        if !(1000..=9999).contains(&year) {
            return Err(format!("invalid year in period {value:?}"));
        }
        Period::new(year, month).ok_or_else(|| format!("invalid month in period {value:?}"))
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodFilter {
    Year(i32),
    Month(Period),
}

impl PeriodFilter {
    pub fn year(&self) -> i32 {
        match self {
            PeriodFilter::Year(year) => *year,
            PeriodFilter::Month(period) => period.year,
        }
    }

    pub fn contains(&self, period: &Period) -> bool {
        match self {
            PeriodFilter::Year(year) => period.year == *year,
            PeriodFilter::Month(month) => month == period,
        }
    }
}

impl FromStr for PeriodFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
            let year = value
                .parse()
                .map_err(|_| format!("invalid year {value:?}"))?;
            return Ok(PeriodFilter::Year(year));
        }
        value.parse().map(PeriodFilter::Month)
    }
}

impl fmt::Display for PeriodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodFilter::Year(year) => write!(f, "{year:04}"),
            PeriodFilter::Month(period) => period.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Monthly,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRecord {
    pub program_slug: String,
    pub project_slug: String,
    pub indicator_name: String,
    pub period: Option<Period>,
    pub scope: Scope,
    pub target_value: Option<f64>,
    pub actual_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub month: String,
    pub target: f64,
    pub realized: f64,
    pub performance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPerformance {
    pub program_slug: String,
    pub total_target: f64,
    pub total_realized: f64,
    pub average_performance: f64,
    pub total_indicators: usize,
    pub monthly_indicators: usize,
    pub has_data: bool,
    pub has_activity: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub captado: f64,
    pub realizado: f64,
    pub andamento: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedSummary {
    pub total_programs: usize,
    pub programs_with_data: usize,
    pub total_indicators: usize,
    pub average_performance: f64,
    pub financial_metrics: FinancialMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorPerformance {
    pub project_slug: String,
    pub indicator_name: String,
    pub target: f64,
    pub realized: f64,
    pub performance_pct: f64,
    pub band: crate::performance::PerformanceBand,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialFeed {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub receitas_meta: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub receitas_captado: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub despesas_meta: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub despesas_realizado: f64,
    #[serde(default)]
    pub dados_mensais: Vec<FinancialMonth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMonth {
    pub mes: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub meta_captado: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub captado: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub meta_realizado: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub realizado: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub saldo: f64,
}

impl FinancialMonth {
    // `mes` may be "2025-09", "09", "Set" or "setembro".
    pub fn period(&self, year: i32) -> Option<Period> {
        let mes = self.mes.trim();
        if let Ok(period) = mes.parse::<Period>() {
            return Some(period);
        }
        if let Ok(month) = mes.parse::<u32>() {
            return Period::new(year, month);
        }
        let lower = mes.to_lowercase();
        MONTH_LABELS
            .iter()
            .position(|label| lower.starts_with(&label.to_lowercase()))
            .and_then(|index| Period::new(year, index as u32 + 1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramFeed {
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub workstreams: Vec<Workstream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workstream {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub indicators: Vec<CatalogIndicator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndicator {
    pub slug: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}
