use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{IndicatorRecord, Period, PeriodFilter, Scope};
use crate::normalize::normalize;

const SOURCE_KEY_FIELDS: &[&str] = &["source_key", "sourceKey", "id"];

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: Vec<ValidationError>,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let indicators = [
        ("cultura_esporte", "casa_sonhar", "Frequência", 120.0, 0.96),
        ("cultura_esporte", "casa_sonhar", "NPS", 80.0, 1.05),
        ("cultura_esporte", "escolinha_futebol", "Crianças atendidas", 60.0, 0.82),
        ("educacao", "reforco_escolar", "Aprovação", 45.0, 0.71),
        ("educacao", "biblioteca_viva", "Empréstimos", 200.0, 1.12),
    ];

    let mut inserted = 0usize;
    for (program, project, indicator, target, ratio) in indicators {
        for month in 1..=9u32 {
            let period = Period::new(2025, month).context("invalid seed period")?;
            let seasonal = 1.0 + (month as f64 - 5.0) * 0.02;
            let record = IndicatorRecord {
                program_slug: program.to_string(),
                project_slug: project.to_string(),
                indicator_name: indicator.to_string(),
                period: Some(period),
                scope: Scope::Monthly,
                target_value: Some(target),
                actual_value: Some((target * ratio * seasonal).round()),
            };
            let source_key = format!("seed-{project}-{indicator}-{period}");
            if insert_record(pool, &record, &source_key).await? {
                inserted += 1;
            }
        }
    }

    Ok(inserted)
}

pub fn load_raw_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut raws = Vec::new();
        for row in reader.deserialize::<HashMap<String, String>>() {
            let row = row.with_context(|| format!("malformed CSV row in {}", path.display()))?;
            let object = row
                .into_iter()
                .map(|(key, value)| (key.trim().to_string(), Value::String(value)))
                .collect();
            raws.push(Value::Object(object));
        }
        return Ok(raws);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("records") {
            Some(Value::Array(items)) => Ok(items),
            _ => anyhow::bail!("{} must hold an array of records", path.display()),
        },
        _ => anyhow::bail!("{} must hold an array of records", path.display()),
    }
}

pub async fn import_records(pool: &PgPool, raws: &[Value]) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (index, raw) in raws.iter().enumerate() {
        let record = match normalize(raw) {
            Ok(record) => record,
            Err(error) => {
                let error = error.at(index);
                warn!(%error, "skipping record");
                summary.rejected.push(error);
                continue;
            }
        };

        let source_key =
            source_key(raw).unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        if insert_record(pool, &record, &source_key).await? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    Ok(summary)
}

pub async fn fetch_records(
    pool: &PgPool,
    filter: &PeriodFilter,
    program: Option<&str>,
) -> anyhow::Result<Vec<IndicatorRecord>> {
    let period_pattern = match filter {
        PeriodFilter::Year(year) => format!("{year:04}-%"),
        PeriodFilter::Month(period) => period.to_string(),
    };

    let rows = sqlx::query(
        r#"
        SELECT program_slug, project_slug, indicator_name, period, target_value, actual_value
        FROM grito_indicators.indicator_records
        WHERE period LIKE $1
          AND ($2::TEXT IS NULL OR program_slug = $2)
        ORDER BY program_slug, period, project_slug, indicator_name
        "#,
    )
    .bind(period_pattern)
    .bind(program)
    .fetch_all(pool)
    .await
    .context("failed to load indicator records")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let period: Option<String> = row.get("period");
        records.push(IndicatorRecord {
            program_slug: row.get("program_slug"),
            project_slug: row.get("project_slug"),
            indicator_name: row.get("indicator_name"),
            period: period.and_then(|value| value.parse().ok()),
            scope: Scope::Monthly,
            target_value: row.get("target_value"),
            actual_value: row.get("actual_value"),
        });
    }

    Ok(records)
}

async fn insert_record(
    pool: &PgPool,
    record: &IndicatorRecord,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO grito_indicators.indicator_records
        (id, program_slug, project_slug, indicator_name, period, scope,
         target_value, actual_value, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.program_slug)
    .bind(&record.project_slug)
    .bind(&record.indicator_name)
    .bind(record.period.map(|period| period.to_string()))
    .bind(record.scope.as_str())
    .bind(record.target_value)
    .bind(record.actual_value)
    .bind(source_key)
    .execute(pool)
    .await
    .with_context(|| format!("failed to store record {source_key}"))?;

    Ok(result.rows_affected() > 0)
}

fn source_key(raw: &Value) -> Option<String> {
    SOURCE_KEY_FIELDS
        .iter()
        .filter_map(|field| raw.get(*field))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}
