//! Constraint primitives and combinators.

use recraft_catalog::AnalysisConfig;

use super::{total_recovery_ratio, Constraint, ExplainedConstraint, Side};
use crate::flow::LoadoutTransition;

// =============================================================================
// Primitives
// =============================================================================

/// The final loadout must cost strictly more than the early one.
#[derive(Clone, Copy, Debug, Default)]
pub struct CostIncrease;

impl Constraint for CostIncrease {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        transition.cost_delta > 0
    }
}

impl ExplainedConstraint for CostIncrease {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition))
            .then(|| format!("cost does not increase (delta {})", transition.cost_delta))
    }
}

/// Cost delta must be at least the bound.
#[derive(Clone, Copy, Debug)]
pub struct MinCostDelta(pub i64);

impl Constraint for MinCostDelta {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        transition.cost_delta >= self.0
    }
}

impl ExplainedConstraint for MinCostDelta {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition)).then(|| {
            format!(
                "cost delta {} is below minimum {}",
                transition.cost_delta, self.0
            )
        })
    }
}

/// Cost delta must be at most the bound.
#[derive(Clone, Copy, Debug)]
pub struct MaxCostDelta(pub i64);

impl Constraint for MaxCostDelta {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        transition.cost_delta <= self.0
    }
}

impl ExplainedConstraint for MaxCostDelta {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition)).then(|| {
            format!(
                "cost delta {} exceeds maximum {}",
                transition.cost_delta, self.0
            )
        })
    }
}

/// Reused gold plus recovered recipe cost must cover at least this fraction
/// of the early loadout's cost. A free early loadout always passes.
#[derive(Clone, Copy, Debug)]
pub struct MinTotalRecovery(pub f64);

impl Constraint for MinTotalRecovery {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        total_recovery_ratio(transition).map_or(true, |ratio| ratio >= self.0)
    }
}

impl ExplainedConstraint for MinTotalRecovery {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        let ratio = total_recovery_ratio(transition)?;
        (ratio < self.0).then(|| {
            format!(
                "total recovery {:.1}% is below {:.1}%",
                ratio * 100.0,
                self.0 * 100.0
            )
        })
    }
}

/// Wasted part gold must not exceed the bound.
#[derive(Clone, Copy, Debug)]
pub struct MaxWastedGold(pub u64);

impl Constraint for MaxWastedGold {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        transition.flow.wasted_gold <= self.0
    }
}

impl ExplainedConstraint for MaxWastedGold {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition)).then(|| {
            format!(
                "wasted gold {} exceeds {}",
                transition.flow.wasted_gold, self.0
            )
        })
    }
}

/// Wasted part gold must not exceed this fraction of the early loadout's
/// cost. A free early loadout always passes.
#[derive(Clone, Copy, Debug)]
pub struct MaxWastedPercent(pub f64);

impl MaxWastedPercent {
    #[allow(clippy::cast_precision_loss)]
    fn wasted_fraction(transition: &LoadoutTransition) -> Option<f64> {
        let invested = transition.from.total_cost();
        (invested > 0).then(|| transition.flow.wasted_gold as f64 / invested as f64)
    }
}

impl Constraint for MaxWastedPercent {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        Self::wasted_fraction(transition).map_or(true, |fraction| fraction <= self.0)
    }
}

impl ExplainedConstraint for MaxWastedPercent {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        let fraction = Self::wasted_fraction(transition)?;
        (fraction > self.0).then(|| {
            format!(
                "wasted {:.1}% of early cost, limit {:.1}%",
                fraction * 100.0,
                self.0 * 100.0
            )
        })
    }
}

/// Item count bounds (inclusive) on one or both sides.
#[derive(Clone, Copy, Debug)]
pub struct ItemCount {
    /// Inspected side.
    pub side: Side,
    /// Minimum item count.
    pub min: usize,
    /// Maximum item count.
    pub max: usize,
}

impl ItemCount {
    /// Creates item count bounds.
    #[must_use]
    pub const fn new(side: Side, min: usize, max: usize) -> Self {
        Self { side, min, max }
    }
}

impl Constraint for ItemCount {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.side
            .loadouts(transition)
            .all(|loadout| (self.min..=self.max).contains(&loadout.len()))
    }
}

impl ExplainedConstraint for ItemCount {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition)).then(|| {
            format!(
                "{} must hold between {} and {} items",
                self.side.label(),
                self.min,
                self.max
            )
        })
    }
}

/// No more than one item from a named category per loadout
/// (e.g. movement items that do not stack).
#[derive(Clone, Debug)]
pub struct AtMostOneOf {
    /// Inspected side.
    pub side: Side,
    /// Category members.
    pub names: Vec<String>,
}

impl AtMostOneOf {
    /// Creates the rule.
    #[must_use]
    pub fn new<S: Into<String>>(side: Side, names: impl IntoIterator<Item = S>) -> Self {
        Self {
            side,
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Constraint for AtMostOneOf {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.side.loadouts(transition).all(|loadout| {
            loadout
                .items()
                .iter()
                .filter(|item| self.names.contains(&item.name))
                .count()
                <= 1
        })
    }
}

impl ExplainedConstraint for AtMostOneOf {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition)).then(|| {
            format!(
                "{} holds more than one of [{}]",
                self.side.label(),
                self.names.join(", ")
            )
        })
    }
}

/// A named item must be present.
#[derive(Clone, Debug)]
pub struct RequireItem {
    /// Inspected side.
    pub side: Side,
    /// Required item name.
    pub name: String,
}

impl RequireItem {
    /// Creates the rule.
    #[must_use]
    pub fn new(side: Side, name: impl Into<String>) -> Self {
        Self {
            side,
            name: name.into(),
        }
    }
}

impl Constraint for RequireItem {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.side
            .loadouts(transition)
            .all(|loadout| loadout.contains(&self.name))
    }
}

impl ExplainedConstraint for RequireItem {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition))
            .then(|| format!("{} lacks required {}", self.side.label(), self.name))
    }
}

/// A named item must be absent.
#[derive(Clone, Debug)]
pub struct ExcludeItem {
    /// Inspected side.
    pub side: Side,
    /// Excluded item name.
    pub name: String,
}

impl ExcludeItem {
    /// Creates the rule.
    #[must_use]
    pub fn new(side: Side, name: impl Into<String>) -> Self {
        Self {
            side,
            name: name.into(),
        }
    }
}

impl Constraint for ExcludeItem {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.side
            .loadouts(transition)
            .all(|loadout| !loadout.contains(&self.name))
    }
}

impl ExplainedConstraint for ExcludeItem {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.evaluate(transition))
            .then(|| format!("{} holds excluded {}", self.side.label(), self.name))
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// Conjunction. Empty passes.
#[derive(Default)]
pub struct AllOf {
    constraints: Vec<Box<dyn Constraint>>,
}

impl AllOf {
    /// Creates an empty conjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member.
    #[must_use]
    pub fn with(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }
}

impl Constraint for AllOf {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.constraints.iter().all(|c| c.evaluate(transition))
    }
}

/// Disjunction. Empty fails.
#[derive(Default)]
pub struct AnyOf {
    constraints: Vec<Box<dyn Constraint>>,
}

impl AnyOf {
    /// Creates an empty disjunction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member.
    #[must_use]
    pub fn with(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }
}

impl Constraint for AnyOf {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.constraints.iter().any(|c| c.evaluate(transition))
    }
}

/// Negation.
pub struct Not(Box<dyn Constraint>);

impl Not {
    /// Negates a constraint.
    #[must_use]
    pub fn new(constraint: impl Constraint + 'static) -> Self {
        Self(Box::new(constraint))
    }
}

impl Constraint for Not {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        !self.0.evaluate(transition)
    }
}

/// Attaches a fixed failure reason to any constraint.
pub struct Explained<C> {
    inner: C,
    reason: String,
}

impl<C: Constraint> Explained<C> {
    /// Wraps `inner`, reporting `reason` when it fails.
    #[must_use]
    pub fn new(inner: C, reason: impl Into<String>) -> Self {
        Self {
            inner,
            reason: reason.into(),
        }
    }
}

impl<C: Constraint> Constraint for Explained<C> {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.inner.evaluate(transition)
    }
}

impl<C: Constraint> ExplainedConstraint for Explained<C> {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        (!self.inner.evaluate(transition)).then(|| self.reason.clone())
    }
}

/// Conjunction that reports every failing member, not just the first.
#[derive(Default)]
pub struct ExplainAll {
    constraints: Vec<Box<dyn ExplainedConstraint>>,
}

impl ExplainAll {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member.
    #[must_use]
    pub fn with(mut self, constraint: impl ExplainedConstraint + 'static) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    /// All failure reasons, member order. Empty on pass.
    #[must_use]
    pub fn failures(&self, transition: &LoadoutTransition) -> Vec<String> {
        self.constraints
            .iter()
            .filter_map(|c| c.explain(transition))
            .collect()
    }
}

impl Constraint for ExplainAll {
    fn evaluate(&self, transition: &LoadoutTransition) -> bool {
        self.constraints
            .iter()
            .all(|c| c.explain(transition).is_none())
    }
}

impl ExplainedConstraint for ExplainAll {
    fn explain(&self, transition: &LoadoutTransition) -> Option<String> {
        let failures = self.failures(transition);
        (!failures.is_empty()).then(|| failures.join("; "))
    }
}

/// Cost increase, minimum total recovery, and at most one stacking-exempt
/// item on either side.
#[must_use]
pub fn default_constraint(config: &AnalysisConfig) -> AllOf {
    AllOf::new()
        .with(CostIncrease)
        .with(MinTotalRecovery(config.min_gold_recovery))
        .with(AtMostOneOf::new(Side::Both, config.stacking_exempt.iter().cloned()))
}
