use serde::{Deserialize, Serialize};

const ATTENTION_THRESHOLD: f64 = 70.0;
const ACHIEVED_THRESHOLD: f64 = 100.0;

/// Percentage of target achieved. A missing or non-positive target yields `0`.
pub fn compute_performance(target: f64, realized: f64) -> f64 {
    if !target.is_finite() || !realized.is_finite() || target <= 0.0 {
        return 0.0;
    }
    let pct = (realized / target) * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceBand {
    NoTarget,
    Critical,
    Attention,
    Achieved,
}

impl PerformanceBand {
    pub fn classify(target: f64, realized: f64) -> Self {
        if !target.is_finite() || target <= 0.0 {
            return PerformanceBand::NoTarget;
        }
        match compute_performance(target, realized) {
            pct if pct >= ACHIEVED_THRESHOLD => PerformanceBand::Achieved,
            pct if pct >= ATTENTION_THRESHOLD => PerformanceBand::Attention,
            _ => PerformanceBand::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceBand::NoTarget => "sem meta",
            PerformanceBand::Critical => "crítico",
            PerformanceBand::Attention => "atenção",
            PerformanceBand::Achieved => "meta atingida",
        }
    }
}
