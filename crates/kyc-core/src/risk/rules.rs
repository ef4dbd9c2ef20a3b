//! Additive point-table risk scoring.

use super::{RiskInputs, RiskStrategy};
use crate::domain::{Result, RiskLevel, RiskResult};

/// `(lower bound, points)`, highest bin first. First match wins.
const INCOME_BINS: [(f64, u32); 3] = [(50_000.0, 50), (30_000.0, 30), (15_000.0, 15)];
/// `(upper bound, points)`, lowest bin first. First match wins.
const LIABILITY_BINS: [(f64, u32); 2] = [(5_000.0, 30), (20_000.0, 10)];
const CREDIT_BINS: [(f64, u32); 2] = [(750.0, 20), (650.0, 10)];

const LOW_RISK_MIN: u32 = 60;
const MEDIUM_RISK_MIN: u32 = 35;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRiskStrategy;

impl RuleRiskStrategy {
    /// Point total in `0..=100`. Inputs are assumed valid.
    pub fn points(inputs: &RiskInputs) -> u32 {
        let income = INCOME_BINS
            .iter()
            .find(|(min, _)| inputs.income >= *min)
            .map_or(0, |(_, pts)| *pts);
        let liabilities = LIABILITY_BINS
            .iter()
            .find(|(max, _)| inputs.liabilities_or_age <= *max)
            .map_or(0, |(_, pts)| *pts);
        let credit = CREDIT_BINS
            .iter()
            .find(|(min, _)| inputs.credit_or_loan_amount >= *min)
            .map_or(0, |(_, pts)| *pts);
        income + liabilities + credit
    }

    pub fn level_for(points: u32) -> RiskLevel {
        if points >= LOW_RISK_MIN {
            RiskLevel::Low
        } else if points >= MEDIUM_RISK_MIN {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl RiskStrategy for RuleRiskStrategy {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn score(&self, inputs: &RiskInputs) -> Result<RiskResult> {
        inputs.validate()?;
        let points = Self::points(inputs);
        Ok(RiskResult {
            risk_score: f64::from(points),
            risk_level: Self::level_for(points),
        })
    }
}
