//! Probabilistic risk scoring with a logistic model.
//!
//! The model is a small JSON document:
//!
//! ```json
//! { "intercept": -1.2,
//!   "weights": { "income": -0.8, "age": -0.1, "loan_amount": 1.4 },
//!   "means":   { "income": 40000, "age": 35, "loan_amount": 200000 },
//!   "scales":  { "income": 15000, "age": 10, "loan_amount": 100000 } }
//! ```
//!
//! `means` and `scales` are optional and default to 0 and 1.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{RiskInputs, RiskStrategy};
use crate::domain::{KycError, Result, RiskLevel, RiskResult};

/// Per-feature values in input order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub income: f64,
    pub age: f64,
    pub loan_amount: f64,
}

impl FeatureVector {
    fn as_array(&self) -> [f64; 3] {
        [self.income, self.age, self.loan_amount]
    }

    const ZERO: Self = Self {
        income: 0.0,
        age: 0.0,
        loan_amount: 0.0,
    };
    const ONE: Self = Self {
        income: 1.0,
        age: 1.0,
        loan_amount: 1.0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRiskModel {
    pub intercept: f64,
    pub weights: FeatureVector,
    #[serde(default)]
    pub means: Option<FeatureVector>,
    #[serde(default)]
    pub scales: Option<FeatureVector>,
}

impl LogisticRiskModel {
    pub fn from_json(text: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(text)?;
        model.check()?;
        Ok(model)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn check(&self) -> Result<()> {
        let finite = |v: &FeatureVector| v.as_array().iter().all(|x| x.is_finite());
        if !self.intercept.is_finite() || !finite(&self.weights) {
            return Err(KycError::Validation(
                "model coefficients must be finite".to_string(),
            ));
        }
        if self.means.as_ref().is_some_and(|m| !finite(m)) {
            return Err(KycError::Validation("model means must be finite".to_string()));
        }
        if let Some(scales) = &self.scales {
            if scales.as_array().iter().any(|s| !s.is_finite() || *s == 0.0) {
                return Err(KycError::Validation(
                    "model scales must be finite and non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Probability of high risk for `(income, age, loan_amount)`.
    ///
    /// NaN when opposing terms both overflow; callers must check.
    pub fn probability(&self, income: f64, age: f64, loan_amount: f64) -> f64 {
        let means = self.means.unwrap_or(FeatureVector::ZERO).as_array();
        let scales = self.scales.unwrap_or(FeatureVector::ONE).as_array();
        let z = [income, age, loan_amount]
            .iter()
            .zip(self.weights.as_array())
            .zip(means.iter().zip(scales))
            .fold(self.intercept, |acc, ((x, w), (m, s))| {
                acc + w * (x - m) / s
            });
        1.0 / (1.0 + (-z).exp())
    }
}

/// Scores with a [`LogisticRiskModel`] loaded once at construction.
///
/// A model that failed to load is reported as `EngineUnavailable` on every
/// call; the strategy never substitutes a score.
#[derive(Debug, Clone)]
pub struct ModelRiskStrategy {
    model: std::result::Result<LogisticRiskModel, String>,
    high_risk_probability: f64,
}

impl ModelRiskStrategy {
    pub fn new(model: LogisticRiskModel, high_risk_probability: f64) -> Self {
        Self {
            model: Ok(model),
            high_risk_probability,
        }
    }

    /// Load the model from `path`. Failures are deferred to scoring time.
    pub fn load(path: Option<&Path>, high_risk_probability: f64) -> Self {
        let model = match path {
            None => Err("no risk model configured".to_string()),
            Some(path) => LogisticRiskModel::from_path(path).map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "risk model unavailable");
                format!("cannot load risk model {}: {e}", path.display())
            }),
        };
        Self {
            model,
            high_risk_probability,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            model: Err(reason.into()),
            high_risk_probability: 0.6,
        }
    }

    pub fn model(&self) -> Result<&LogisticRiskModel> {
        self.model
            .as_ref()
            .map_err(|reason| KycError::EngineUnavailable(reason.clone()))
    }

    pub fn level_for(&self, probability: f64) -> RiskLevel {
        if probability > self.high_risk_probability {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

impl RiskStrategy for ModelRiskStrategy {
    fn name(&self) -> &'static str {
        "model"
    }

    /// Reads `liabilities_or_age` as age and `credit_or_loan_amount` as the
    /// requested loan amount.
    fn score(&self, inputs: &RiskInputs) -> Result<RiskResult> {
        let model = self.model()?;
        inputs.validate()?;
        let p = model.probability(
            inputs.income,
            inputs.liabilities_or_age,
            inputs.credit_or_loan_amount,
        );
        if !p.is_finite() {
            return Err(KycError::Validation(format!(
                "inputs overflow the risk model (income={}, age={}, loan_amount={})",
                inputs.income, inputs.liabilities_or_age, inputs.credit_or_loan_amount
            )));
        }
        Ok(RiskResult {
            risk_score: p,
            risk_level: self.level_for(p),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RuleRiskStrategy;

    fn model(intercept: f64) -> LogisticRiskModel {
        LogisticRiskModel {
            intercept,
            weights: FeatureVector {
                income: -1.0,
                age: 0.0,
                loan_amount: 1.0,
            },
            means: None,
            scales: Some(FeatureVector {
                income: 10_000.0,
                age: 1.0,
                loan_amount: 10_000.0,
            }),
        }
    }

    #[test]
    fn zero_logit_is_even_odds() {
        let p = model(0.0).probability(10_000.0, 30.0, 10_000.0);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn probability_above_cutoff_is_high() {
        let strategy = ModelRiskStrategy::new(model(0.0), 0.6);
        let result = strategy
            .score(&RiskInputs::new(10_000.0, 30.0, 50_000.0))
            .unwrap();
        assert!(result.risk_score > 0.6);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn probability_at_cutoff_is_low() {
        let strategy = ModelRiskStrategy::new(model(0.0), 0.5);
        let result = strategy
            .score(&RiskInputs::new(10_000.0, 30.0, 10_000.0))
            .unwrap();
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn model_never_produces_medium() {
        let strategy = ModelRiskStrategy::new(model(0.0), 0.6);
        for loan in [0.0, 5_000.0, 10_000.0, 14_000.0, 20_000.0, 80_000.0] {
            let result = strategy
                .score(&RiskInputs::new(10_000.0, 30.0, loan))
                .unwrap();
            assert_ne!(result.risk_level, RiskLevel::Medium);
            assert!((0.0..=1.0).contains(&result.risk_score));
        }
    }

    #[test]
    fn strategies_disagree_on_output_cardinality() {
        // Rules have three tiers on a 0..=100 scale; the model has two on 0..=1.
        let rules = RuleRiskStrategy
            .score(&RiskInputs::new(30_000.0, 25_000.0, 700.0))
            .unwrap();
        assert_eq!(rules.risk_level, RiskLevel::Medium);
        assert!(rules.risk_score > 1.0);

        let levels: std::collections::BTreeSet<_> = [0.0, 100_000.0]
            .into_iter()
            .map(|loan| {
                ModelRiskStrategy::new(model(0.0), 0.6)
                    .score(&RiskInputs::new(10_000.0, 30.0, loan))
                    .unwrap()
                    .risk_level
            })
            .collect();
        assert_eq!(
            levels.into_iter().collect::<Vec<_>>(),
            vec![RiskLevel::Low, RiskLevel::High]
        );
    }

    #[test]
    fn json_round_trips_with_optional_normalisation() {
        let parsed = LogisticRiskModel::from_json(
            r#"{"intercept": 0.5, "weights": {"income": 0.0, "age": 0.0, "loan_amount": 0.0}}"#,
        )
        .unwrap();
        assert!(parsed.means.is_none());
        let expected = 1.0 / (1.0 + (-0.5f64).exp());
        assert!((parsed.probability(1.0, 2.0, 3.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let err = LogisticRiskModel::from_json(
            r#"{"intercept": 0, "weights": {"income": 1, "age": 1, "loan_amount": 1},
                "scales": {"income": 0, "age": 1, "loan_amount": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, KycError::Validation(_)));
    }

    #[test]
    fn missing_model_is_engine_unavailable_not_a_score() {
        let strategy = ModelRiskStrategy::load(Some(Path::new("/no/such/model.json")), 0.6);
        let err = strategy
            .score(&RiskInputs::new(1.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, KycError::EngineUnavailable(_)));

        let unconfigured = ModelRiskStrategy::load(None, 0.6);
        assert!(matches!(
            unconfigured.score(&RiskInputs::new(1.0, 1.0, 1.0)),
            Err(KycError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn malformed_model_file_is_engine_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        let strategy = ModelRiskStrategy::load(Some(&path), 0.6);
        assert!(matches!(
            strategy.score(&RiskInputs::new(1.0, 1.0, 1.0)),
            Err(KycError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn overflowing_logit_is_rejected_not_scored() {
        let tiny = FeatureVector {
            income: 1e-308,
            age: 1.0,
            loan_amount: 1e-308,
        };
        let model = LogisticRiskModel {
            intercept: 0.0,
            weights: FeatureVector {
                income: 1.0,
                age: 0.0,
                loan_amount: -1.0,
            },
            means: None,
            scales: Some(tiny),
        };
        assert!(model.probability(1e10, 30.0, 1e10).is_nan());

        let err = ModelRiskStrategy::new(model, 0.6)
            .score(&RiskInputs::new(1e10, 30.0, 1e10))
            .unwrap_err();
        assert!(matches!(err, KycError::Validation(_)));
    }
}
