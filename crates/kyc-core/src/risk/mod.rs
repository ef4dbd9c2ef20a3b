//! Risk engine.
//!
//! Two strategies with deliberately different outputs: [`RuleRiskStrategy`]
//! returns a 0..=100 point total over three tiers, [`ModelRiskStrategy`]
//! returns a probability over two tiers (no `MEDIUM`). Callers pick one.

pub mod model;
pub mod rules;

use serde::{Deserialize, Serialize};

use crate::domain::{KycError, Result, RiskResult};

pub use model::{LogisticRiskModel, ModelRiskStrategy};
pub use rules::RuleRiskStrategy;

/// Applicant financial inputs.
///
/// The meaning of the second and third values depends on the strategy:
/// liabilities and credit score for rules, age and loan amount for the
/// model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub income: f64,
    pub liabilities_or_age: f64,
    pub credit_or_loan_amount: f64,
}

impl RiskInputs {
    pub fn new(income: f64, liabilities_or_age: f64, credit_or_loan_amount: f64) -> Self {
        Self {
            income,
            liabilities_or_age,
            credit_or_loan_amount,
        }
    }

    /// Every value must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("income", self.income),
            ("liabilities_or_age", self.liabilities_or_age),
            ("credit_or_loan_amount", self.credit_or_loan_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(KycError::Validation(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Capability interface shared by the risk strategies.
pub trait RiskStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, inputs: &RiskInputs) -> Result<RiskResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_nan_inputs_rejected() {
        assert!(RiskInputs::new(1.0, 2.0, 3.0).validate().is_ok());
        assert!(matches!(
            RiskInputs::new(-1.0, 0.0, 0.0).validate(),
            Err(KycError::Validation(_))
        ));
        assert!(matches!(
            RiskInputs::new(1.0, f64::NAN, 0.0).validate(),
            Err(KycError::Validation(_))
        ));
        assert!(matches!(
            RiskInputs::new(1.0, 0.0, f64::INFINITY).validate(),
            Err(KycError::Validation(_))
        ));
    }
}
