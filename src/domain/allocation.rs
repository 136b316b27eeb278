//! Portfolio weight allocation.

/// A named mapping from symbol to nonnegative weight, normalized so the
/// weights sum to 1. Built from user-entered percentages; a zero-sum entry
/// set produces an empty, inert allocation rather than an error.
#[derive(Debug, Clone)]
pub struct PortfolioAllocation {
    pub name: String,
    weights: Vec<(String, f64)>,
}

impl PortfolioAllocation {
    pub fn from_percentages(name: impl Into<String>, entries: &[(String, f64)]) -> Self {
        let kept: Vec<(String, f64)> = entries
            .iter()
            .filter(|(symbol, pct)| !symbol.trim().is_empty() && pct.is_finite() && *pct > 0.0)
            .map(|(symbol, pct)| (symbol.trim().to_uppercase(), *pct))
            .collect();
        let total: f64 = kept.iter().map(|(_, pct)| pct).sum();
        if total <= 0.0 {
            return PortfolioAllocation {
                name: name.into(),
                weights: vec![],
            };
        }
        PortfolioAllocation {
            name: name.into(),
            weights: kept
                .into_iter()
                .map(|(symbol, pct)| (symbol, pct / total))
                .collect(),
        }
    }

    pub fn weights(&self) -> &[(String, f64)] {
        &self.weights
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(s, _)| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
