use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ValidationError;
use crate::models::{IndicatorRecord, Period, Scope};

const PROGRAM_KEYS: &[&str] = &["programSlug", "program_slug", "program", "programa"];
const PROJECT_KEYS: &[&str] = &["projectSlug", "project_slug", "project", "projeto"];
const INDICATOR_KEYS: &[&str] = &[
    "indicatorName",
    "indicator_name",
    "indicator",
    "indicador",
    "nome",
];
const PERIOD_KEYS: &[&str] = &["period", "mes", "periodo", "month"];
const SCOPE_KEYS: &[&str] = &["scope", "escopo"];
const TARGET_KEYS: &[&str] = &[
    "targetValue",
    "target_value",
    "target",
    "meta_captado",
    "meta",
];
const ACTUAL_KEYS: &[&str] = &[
    "actualValue",
    "actual_value",
    "actual",
    "captado",
    "realizado",
];

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<IndicatorRecord>,
    pub rejected: Vec<ValidationError>,
}

/// Maps one upstream record onto the canonical [`IndicatorRecord`].
pub fn normalize(raw: &Value) -> Result<IndicatorRecord, ValidationError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| ValidationError::new("record is not a JSON object"))?;

    let program = text_field(fields, PROGRAM_KEYS);
    let project = text_field(fields, PROJECT_KEYS);
    let (program_slug, project_slug) = match (program, project) {
        (Some(program), Some(project)) => (program, project),
        (Some(program), None) => (program.clone(), program),
        (None, Some(project)) => (project.clone(), project),
        (None, None) => {
            return Err(ValidationError::new(
                "record has neither a program nor a project slug",
            ))
        }
    };

    let period = text_field(fields, PERIOD_KEYS).and_then(|value| match value.parse::<Period>() {
        Ok(period) => Some(period),
        Err(reason) => {
            warn!(%program_slug, %reason, "dropping unparsable period");
            None
        }
    });

    if let Some(scope) = text_field(fields, SCOPE_KEYS) {
        if !matches!(scope.to_lowercase().as_str(), "monthly" | "mensal" | "month") {
            warn!(%program_slug, %scope, "unknown scope, treating record as monthly");
        }
    }

    Ok(IndicatorRecord {
        indicator_name: text_field(fields, INDICATOR_KEYS).unwrap_or_default(),
        target_value: measure_field(fields, TARGET_KEYS, &program_slug),
        actual_value: measure_field(fields, ACTUAL_KEYS, &program_slug),
        program_slug,
        project_slug,
        period,
        scope: Scope::Monthly,
    })
}

pub fn normalize_batch(raws: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                let error = error.at(index);
                warn!(%error, "skipping record");
                batch.rejected.push(error);
            }
        }
    }

    batch
}

pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(text) => parse_locale_number(text),
        _ => None,
    }
}

// A single dot with no comma is a decimal point: "1.234" is 1.234.
pub fn parse_locale_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.matches('.').count() > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    canonical
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

// Anything unusable becomes 0.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value).unwrap_or(0.0))
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        })
}

fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(fields, keys).and_then(|value| match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn measure_field(fields: &Map<String, Value>, keys: &[&str], program_slug: &str) -> Option<f64> {
    let value = lookup(fields, keys)?;
    match parse_number(value) {
        Some(number) if number < 0.0 => {
            warn!(%program_slug, number, "dropping negative measurement");
            None
        }
        Some(number) => Some(number),
        None => {
            warn!(%program_slug, %value, "dropping unparsable measurement");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comma_and_dot_decimals() {
        assert_eq!(parse_locale_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("1234.56"), Some(1234.56));
        assert_eq!(parse_locale_number("R$ 1.234.567"), Some(1234567.0));
        assert_eq!(parse_locale_number("85%"), Some(85.0));
        assert_eq!(parse_locale_number("12,5"), Some(12.5));
        assert_eq!(parse_locale_number("R$ 1.234"), Some(1.234));
        assert_eq!(parse_locale_number("R$ 1.234,00"), Some(1234.0));
        assert_eq!(parse_locale_number("n/a"), None);
        assert_eq!(parse_locale_number("   "), None);
        assert_eq!(parse_locale_number("NaN"), None);
        assert_eq!(parse_locale_number("inf"), None);
    }

    #[test]
    fn canonical_fields_pass_through() {
        let record = normalize(&json!({
            "programSlug": "cultura_esporte",
            "projectSlug": "casa_sonhar",
            "indicatorName": "Frequência",
            "period": "2025-09",
            "scope": "monthly",
            "targetValue": 120,
            "actualValue": 125
        }))
        .unwrap();

        assert_eq!(record.program_slug, "cultura_esporte");
        assert_eq!(record.project_slug, "casa_sonhar");
        assert_eq!(record.indicator_name, "Frequência");
        assert_eq!(record.period, Some(Period { year: 2025, month: 9 }));
        assert_eq!(record.target_value, Some(120.0));
        assert_eq!(record.actual_value, Some(125.0));
    }

    #[test]
    fn source_aliases_map_to_canonical_shape() {
        let record = normalize(&json!({
            "programa": "educacao",
            "projeto": "reforco_escolar",
            "mes": "2025-03",
            "meta_captado": "1.234,56",
            "captado": "1000.5"
        }))
        .unwrap();

        assert_eq!(record.program_slug, "educacao");
        assert_eq!(record.period, Some(Period { year: 2025, month: 3 }));
        assert_eq!(record.scope, Scope::Monthly);
        assert_eq!(record.target_value, Some(1234.56));
        assert_eq!(record.actual_value, Some(1000.5));
    }

    #[test]
    fn unusable_measurements_become_none() {
        let record = normalize(&json!({
            "program": "casa_sonhar",
            "target": "sem meta",
            "actual": -4,
            "period": "not a month"
        }))
        .unwrap();

        assert_eq!(record.target_value, None);
        assert_eq!(record.actual_value, None);
        assert_eq!(record.period, None);
    }

    #[test]
    fn missing_slug_borrows_the_other_one() {
        let record = normalize(&json!({ "projectSlug": "casa_sonhar" })).unwrap();
        assert_eq!(record.program_slug, "casa_sonhar");
        assert_eq!(record.project_slug, "casa_sonhar");
    }

    #[test]
    fn unattributable_records_are_rejected() {
        assert!(normalize(&json!({ "target": 10, "programSlug": "  " })).is_err());
        assert!(normalize(&json!(42)).is_err());
    }

    #[test]
    fn batch_skips_invalid_records() {
        let batch = normalize_batch(&[
            json!({ "program": "casa_sonhar", "period": "2025-01", "target": 10 }),
            json!({ "target": 10 }),
            json!({ "project": "reforco_escolar" }),
        ]);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, Some(1));
    }
}
