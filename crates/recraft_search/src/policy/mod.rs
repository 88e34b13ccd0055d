//! # Policy Layer
//!
//! Validity rules ([`Constraint`]) and quality functions ([`Scorer`]) over a
//! [`LoadoutTransition`], composed from small primitives.
//!
//! ```text
//!   AllOf ─┬─ CostIncrease
//!          ├─ MinTotalRecovery(0.5)
//!          └─ AtMostOneOf(Both, [boots, travel_boots])
//!
//!   WeightedSum ─┬─ 1.0 × TotalRecovery
//!                ├─ 0.5 × ReuseRatio
//!                └─ 0.5 × WastePenalty
//! ```
//!
//! Every policy is total and pure. Both traits are implemented for plain
//! closures, so one-off rules need no new type.
//!
//! Policies are `Send + Sync` and shared read-only across parallel workers.

pub mod constraint;
pub mod scorer;

pub use constraint::{
    default_constraint, AllOf, AnyOf, AtMostOneOf, CostIncrease, ExcludeItem, ExplainAll,
    Explained, ItemCount, MaxCostDelta, MaxWastedGold, MaxWastedPercent, MinCostDelta,
    MinTotalRecovery, Not, RequireItem,
};
pub use scorer::{
    default_scorer, AverageScore, Clamp, CostDelta, EfficiencyGain, MaxScore, MinScore,
    ReuseRatio, StatGain, TotalRecovery, Transform, WastePenalty, WeightedSum,
};

use crate::flow::LoadoutTransition;
use crate::loadout::Loadout;

/// A total validity predicate over a transition.
pub trait Constraint: Send + Sync {
    /// Whether the transition is acceptable.
    fn evaluate(&self, transition: &LoadoutTransition) -> bool;
}

impl<F> Constraint for F
where
    F: Fn(&LoadoutTransition) -> bool + Send + Sync,
{
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self(transition)
    }
}

/// A constraint that can say why it failed.
pub trait ExplainedConstraint: Send + Sync {
    /// `None` on pass, otherwise a human-readable reason.
    fn explain(&self, transition: &LoadoutTransition) -> Option<String>;
}

/// A total quality function over a transition. Higher is better.
pub trait Scorer: Send + Sync {
    /// Scores the transition.
    fn score(&self, transition: &LoadoutTransition) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&LoadoutTransition) -> f64 + Send + Sync,
{
    fn score(&self, transition: &LoadoutTransition) -> f64 {
        self(transition)
    }
}

/// Which loadout(s) of a transition a rule inspects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The early loadout.
    From,
    /// The final loadout.
    To,
    /// Both loadouts; the rule must hold for each.
    Both,
}

impl Side {
    /// Loadouts selected by this side.
    pub(crate) fn loadouts<'a>(
        self,
        transition: &'a LoadoutTransition,
    ) -> impl Iterator<Item = &'a Loadout> {
        let from = matches!(self, Self::From | Self::Both).then_some(&*transition.from);
        let to = matches!(self, Self::To | Self::Both).then_some(&*transition.to);
        from.into_iter().chain(to)
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::From => "early loadout",
            Self::To => "final loadout",
            Self::Both => "either loadout",
        }
    }
}

/// `(reused_gold + recovered_recipe_cost) / from.total_cost`.
///
/// `None` when the early loadout cost nothing.
#[must_use]
pub fn total_recovery_ratio(transition: &LoadoutTransition) -> Option<f64> {
    let invested = transition.from.total_cost();
    if invested == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = transition.flow.recovered_gold() as f64 / invested as f64;
    Some(ratio)
}
