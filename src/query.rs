use crate::models::PeriodFilter;

const ENTITIES: &[(&str, &str)] = &[
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#x27;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
];

// Upstream sometimes encodes `&` twice (`&amp;amp;`).
const MAX_DECODE_PASSES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub period: PeriodFilter,
    pub scope: Option<String>,
}

impl QueryKey {
    pub fn new(period: PeriodFilter, scope: Option<&str>) -> Self {
        let scope = scope
            .map(decode_html_entities)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self { period, scope }
    }

    pub fn parse(period: &str, scope: Option<&str>) -> Result<Self, String> {
        Ok(Self::new(period.parse()?, scope))
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("period", self.period.to_string())];
        if let Some(scope) = &self.scope {
            params.push(("departamento", scope.clone()));
        }
        params
    }

    pub fn label(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{} / {}", self.period, scope),
            None => self.period.to_string(),
        }
    }
}

pub fn decode_html_entities(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        if !current.contains('&') {
            break;
        }
        let decoded = decode_once(&current);
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

fn decode_once(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        match ENTITIES
            .iter()
            .find(|(entity, _)| tail.starts_with(*entity))
        {
            Some((entity, replacement)) => {
                output.push_str(replacement);
                rest = &tail[entity.len()..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }

    output.push_str(rest);
    output
}
