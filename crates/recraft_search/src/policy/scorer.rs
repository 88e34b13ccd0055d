//! Scorer presets and combinators.

use super::{total_recovery_ratio, Scorer};
use crate::flow::LoadoutTransition;

// =============================================================================
// Presets
// =============================================================================

/// `(reused_gold + recovered_recipe_cost) / from.total_cost`, 0 for a free
/// early loadout.
#[derive(Clone, Copy, Debug, Default)]
pub struct TotalRecovery;

impl Scorer for TotalRecovery {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        total_recovery_ratio(transition).unwrap_or(0.0)
    }
}

/// Fraction of early parts reused.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReuseRatio;

impl Scorer for ReuseRatio {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        let parts = transition.from.part_count();
        if parts == 0 {
            return 0.0;
        }
        transition.flow.reused.len() as f64 / parts as f64
    }
}

/// Negative wasted gold as a fraction of early cost.
#[derive(Clone, Copy, Debug, Default)]
pub struct WastePenalty;

impl Scorer for WastePenalty {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        let invested = transition.from.total_cost();
        if invested == 0 {
            return 0.0;
        }
        -(transition.flow.wasted_gold as f64 / invested as f64)
    }
}

/// Raw cost delta in gold.
#[derive(Clone, Copy, Debug, Default)]
pub struct CostDelta;

impl Scorer for CostDelta {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        transition.cost_delta as f64
    }
}

/// Stat value gained by the final loadout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatGain;

impl Scorer for StatGain {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        transition.to.stat_value() - transition.from.stat_value()
    }
}

/// Efficiency gained by the final loadout.
#[derive(Clone, Copy, Debug, Default)]
pub struct EfficiencyGain;

impl Scorer for EfficiencyGain {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        transition.to.efficiency() - transition.from.efficiency()
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// `Σ weight × score`. Empty scores 0.
#[derive(Default)]
pub struct WeightedSum {
    terms: Vec<(f64, Box<dyn Scorer>)>,
}

impl WeightedSum {
    /// Creates an empty sum.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted term.
    #[must_use]
    pub fn with(mut self, weight: f64, scorer: impl Scorer + 'static) -> Self {
        self.terms.push((weight, Box::new(scorer)));
        self
    }
}

impl Scorer for WeightedSum {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        self.terms
            .iter()
            .map(|(weight, scorer)| weight * scorer.score(transition))
            .sum()
    }
}

macro_rules! reducing_scorer {
    ($name:ident, $doc:literal, |$scores:ident| $reduce:expr) => {
        #[doc = $doc]
        #[derive(Default)]
        pub struct $name {
            scorers: Vec<Box<dyn Scorer>>,
        }

        impl $name {
            /// Creates an empty combinator.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Adds a member.
            #[must_use]
            pub fn with(mut self, scorer: impl Scorer + 'static) -> Self {
                self.scorers.push(Box::new(scorer));
                self
            }
        }

        impl Scorer for $name {
            fn score(&self, transition: &LoadoutTransition) -> f64 {
                if self.scorers.is_empty() {
                    return 0.0;
                }
                let $scores = self.scorers.iter().map(|s| s.score(transition));
                $reduce
            }
        }
    };
}

reducing_scorer!(MaxScore, "Highest member score. Empty scores 0.", |scores| {
    scores.fold(f64::NEG_INFINITY, f64::max)
});

reducing_scorer!(MinScore, "Lowest member score. Empty scores 0.", |scores| {
    scores.fold(f64::INFINITY, f64::min)
});

reducing_scorer!(AverageScore, "Mean member score. Empty scores 0.", |scores| {
    let (sum, count) = scores.fold((0.0, 0u32), |(sum, count), s| (sum + s, count + 1));
    sum / f64::from(count)
});

/// Applies a function to another scorer's output.
pub struct Transform {
    inner: Box<dyn Scorer>,
    map: Box<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl Transform {
    /// Wraps `inner`, mapping its score through `map`.
    #[must_use]
    pub fn new(
        inner: impl Scorer + 'static,
        map: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Box::new(inner),
            map: Box::new(map),
        }
    }
}

impl Scorer for Transform {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        (self.map)(self.inner.score(transition))
    }
}

/// Clamps another scorer's output into `[min, max]`.
pub struct Clamp {
    inner: Box<dyn Scorer>,
    min: f64,
    max: f64,
}

impl Clamp {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: impl Scorer + 'static, min: f64, max: f64) -> Self {
        Self {
            inner: Box::new(inner),
            min,
            max,
        }
    }
}

impl Scorer for Clamp {
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        self.inner.score(transition).clamp(self.min, self.max)
    }
}

/// Recovery first, then part reuse, minus waste.
#[must_use]
pub fn default_scorer() -> WeightedSum {
    WeightedSum::new()
        .with(1.0, TotalRecovery)
        .with(0.5, ReuseRatio)
        .with(0.5, WastePenalty)
}
