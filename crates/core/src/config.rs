//! Rubric and session limits, fixed for the lifetime of a coach.

use crate::evaluation::{DimensionWeights, RubricError};

pub const DEFAULT_MAX_TURNS: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct CoachConfig {
    weights: DimensionWeights,
    denylist: Vec<String>,
    max_turns: u32,
}

impl CoachConfig {
    pub fn new(
        weights: DimensionWeights,
        denylist: Vec<String>,
        max_turns: u32,
    ) -> Result<Self, RubricError> {
        if max_turns == 0 {
            return Err(RubricError::ZeroMaxTurns);
        }
        if denylist.iter().any(|term| term.trim().is_empty()) {
            return Err(RubricError::EmptyDenylistTerm);
        }
        Ok(Self {
            weights,
            denylist,
            max_turns,
        })
    }

    pub fn weights(&self) -> DimensionWeights {
        self.weights
    }

    pub fn denylist(&self) -> &[String] {
        &self.denylist
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            denylist: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoachConfig::default();
        assert_eq!(config.max_turns(), 8);
        assert!(config.denylist().is_empty());
        assert_eq!(config.weights(), DimensionWeights::new([25, 25, 25, 25]).unwrap());
    }

    #[test]
    fn test_rejects_invalid_limits() {
        let weights = DimensionWeights::default();
        assert_eq!(
            CoachConfig::new(weights, vec![], 0),
            Err(RubricError::ZeroMaxTurns)
        );
        assert_eq!(
            CoachConfig::new(weights, vec!["最便宜".into(), " ".into()], 8),
            Err(RubricError::EmptyDenylistTerm)
        );
        assert!(CoachConfig::new(weights, vec!["最便宜".into()], 4).is_ok());
    }
}
