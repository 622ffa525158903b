//! Rule algebra
//!
//! A rule pairs a predicate with a result and an optional priority. Rule
//! sets are validated, filtered by priority and sorted before evaluation.
//! The rule fold lets a step stop evaluation with [`Step::Break`], which is
//! how "first matching rule wins" is expressed without scanning the rest
//! of the set.

use crate::config::{EvalConfig, PriorityBounds, RuleSetConfig};
use crate::error::{BoxError, Diagnostic, RuleFailure};
use crate::fold::{self, FoldError, Hooks, LazyFold, Outcome, Step};
use crate::predicate::Predicate;
use std::cmp::Ordering;

/// A validated rule
#[derive(Debug, Clone)]
pub struct Rule<P, R> {
    predicate: P,
    result: R,
    priority: Option<f64>,
}

impl<P, R> Rule<P, R> {
    /// The embedded predicate
    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// The value produced when the rule matches
    pub fn result(&self) -> &R {
        &self.result
    }

    /// Priority as given; `None` when absent
    pub fn priority(&self) -> Option<f64> {
        self.priority
    }

    /// Priority used for ordering; absent counts as 0
    pub fn effective_priority(&self) -> f64 {
        self.priority.unwrap_or(0.0)
    }

    /// Split into predicate, result and priority
    pub fn into_parts(self) -> (P, R, Option<f64>) {
        (self.predicate, self.result, self.priority)
    }
}

/// Unvalidated rule shape
#[derive(Debug, Clone)]
pub struct RawRule<P, R> {
    /// Embedded predicate
    pub predicate: Option<P>,
    /// Result value
    pub result: Option<R>,
    /// Optional priority, must be finite when present
    pub priority: Option<f64>,
}

impl<P, R> RawRule<P, R> {
    /// Raw rule with predicate and result, no priority
    pub fn new(predicate: P, result: R) -> Self {
        Self {
            predicate: Some(predicate),
            result: Some(result),
            priority: None,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl<P, R> From<Rule<P, R>> for RawRule<P, R> {
    fn from(rule: Rule<P, R>) -> Self {
        Self {
            predicate: Some(rule.predicate),
            result: Some(rule.result),
            priority: rule.priority,
        }
    }
}

/// Caller-supplied check on an embedded predicate
pub type PredicateGuard<P> = dyn Fn(&P) -> bool;

/// Build and validate a rule
pub fn create<P, R>(
    predicate: P,
    result: R,
    priority: Option<f64>,
) -> Result<Rule<P, R>, RuleFailure> {
    validate(
        RawRule {
            predicate: Some(predicate),
            result: Some(result),
            priority,
        },
        None,
    )
}

/// Validate a raw rule.
///
/// Without a guard, a present predicate is accepted as is.
pub fn validate<P, R>(
    value: RawRule<P, R>,
    guard: Option<&PredicateGuard<P>>,
) -> Result<Rule<P, R>, RuleFailure> {
    validate_at(0, value, guard)
}

fn validate_at<P, R>(
    index: usize,
    value: RawRule<P, R>,
    guard: Option<&PredicateGuard<P>>,
) -> Result<Rule<P, R>, RuleFailure> {
    let RawRule {
        predicate,
        result,
        priority,
    } = value;

    let predicate = predicate.ok_or_else(|| RuleFailure::InvalidRule {
        index,
        reason: "missing predicate".to_string(),
    })?;
    let result = result.ok_or_else(|| RuleFailure::InvalidRule {
        index,
        reason: "missing result".to_string(),
    })?;

    if guard.is_some_and(|accepts| !accepts(&predicate)) {
        return Err(RuleFailure::InvalidPredicate { index });
    }
    if let Some(priority) = priority.filter(|p| !p.is_finite()) {
        return Err(RuleFailure::InvalidPriority { index, priority });
    }

    Ok(Rule {
        predicate,
        result,
        priority,
    })
}

/// Validate a batch, failing on the first invalid rule
pub fn validate_all<P, R, I>(
    rules: I,
    config: &RuleSetConfig,
    guard: Option<&PredicateGuard<P>>,
) -> Result<Vec<Rule<P, R>>, RuleFailure>
where
    I: IntoIterator<Item = RawRule<P, R>>,
{
    let rules: Vec<RawRule<P, R>> = rules.into_iter().collect();

    if rules.is_empty() {
        return if config.allow_empty {
            Ok(Vec::new())
        } else {
            Err(RuleFailure::EmptyRules)
        };
    }
    if let Some(limit) = config.max_composition_size.filter(|limit| rules.len() > *limit) {
        return Err(RuleFailure::CompositionError(Diagnostic::limit_exceeded(limit, None)));
    }

    rules
        .into_iter()
        .enumerate()
        .map(|(index, rule)| validate_at(index, rule, guard))
        .collect()
}

/// Stable sort, highest priority first
pub fn sort_by_priority<P, R>(mut rules: Vec<Rule<P, R>>) -> Result<Vec<Rule<P, R>>, RuleFailure> {
    if rules.is_empty() {
        return Err(RuleFailure::EmptyRules);
    }
    rules.sort_by(|a, b| {
        b.effective_priority()
            .partial_cmp(&a.effective_priority())
            .unwrap_or(Ordering::Equal)
    });
    Ok(rules)
}

/// Keep rules whose priority lies within the inclusive bounds.
///
/// `None` slots are skipped. A non-finite bound is rejected.
pub fn filter_by_priority<P, R, I, T>(
    rules: I,
    bounds: &PriorityBounds,
) -> Result<Vec<Rule<P, R>>, RuleFailure>
where
    I: IntoIterator<Item = T>,
    T: Into<Option<Rule<P, R>>>,
{
    for bound in [bounds.min_priority, bounds.max_priority].into_iter().flatten() {
        if !bound.is_finite() {
            return Err(RuleFailure::InvalidPriority {
                index: 0,
                priority: bound,
            });
        }
    }

    let slots: Vec<Option<Rule<P, R>>> = rules.into_iter().map(Into::into).collect();
    if slots.is_empty() {
        return Err(RuleFailure::EmptyRules);
    }

    Ok(slots
        .into_iter()
        .flatten()
        .filter(|rule| bounds.contains(rule.effective_priority()))
        .collect())
}

/// Validate, filter, then sort; the first failing stage wins.
///
/// With `allow_empty`, a set that ends up empty is returned as is.
pub fn prepare<P, R, I>(
    rules: I,
    config: &RuleSetConfig,
    guard: Option<&PredicateGuard<P>>,
) -> Result<Vec<Rule<P, R>>, RuleFailure>
where
    I: IntoIterator<Item = RawRule<P, R>>,
{
    let validated = validate_all(rules, config, guard)?;
    if validated.is_empty() {
        return Ok(validated);
    }

    let filtered = filter_by_priority(validated, &config.bounds)?;
    if filtered.is_empty() && config.allow_empty {
        return Ok(filtered);
    }

    sort_by_priority(filtered)
}

/// A fold over a rule list whose steps may stop evaluation
pub trait RuleOperation<P, R, F: ?Sized, C: ?Sized> {
    /// Accumulated state
    type State;
    /// Final value
    type Output;

    /// Starting state
    fn init(&self) -> Result<Self::State, BoxError>;

    /// Fold one rule; return [`Step::Break`] to stop here
    fn step(
        &self,
        state: Self::State,
        rule: &Rule<P, R>,
        fact: &F,
        context: &C,
    ) -> Result<Step<Self::State>, BoxError>;

    /// Produce the final value
    fn finalize(&self, state: Self::State) -> Result<Self::Output, BoxError>;
}

fn fold_failure(err: FoldError, config: &EvalConfig) -> RuleFailure {
    let metadata = config.error_metadata();
    match err {
        FoldError::Empty => RuleFailure::EmptyRules,
        FoldError::LimitExceeded { limit } => {
            RuleFailure::CompositionError(Diagnostic::limit_exceeded(limit, metadata))
        }
        FoldError::Init(fault) => RuleFailure::CompositionError(fault.into_diagnostic(0, metadata)),
        FoldError::Step { index, fault } | FoldError::Finalize { index, fault } => {
            RuleFailure::CompositionError(fault.into_diagnostic(index, metadata))
        }
    }
}

/// Fold an operation over a rule slice
pub fn operate<Op, P, R, F, C>(
    operation: &Op,
    rules: &[Rule<P, R>],
    fact: &F,
    context: &C,
    config: &EvalConfig,
    hooks: &dyn Hooks<Op::State, Op::Output>,
) -> Result<Op::Output, RuleFailure>
where
    Op: RuleOperation<P, R, F, C>,
    F: ?Sized,
    C: ?Sized,
{
    fold::run(
        rules,
        config.max_composition_size,
        || operation.init(),
        |state, _, rule| operation.step(state, rule, fact, context),
        |state| operation.finalize(state),
        hooks,
    )
    .map_err(|err| fold_failure(err, config))
}

/// Streaming fold over a rule sequence.
///
/// After a step breaks, the next pull yields the finalized output and the
/// source is never pulled again.
pub fn operate_lazy<'a, Op, P, R, F, C, I>(
    operation: &'a Op,
    rules: I,
    fact: &'a F,
    context: &'a C,
    config: &'a EvalConfig,
    hooks: &'a dyn Hooks<Op::State, Op::Output>,
) -> OperateLazy<'a, I::IntoIter, P, R, Op::State, Op::Output>
where
    Op: RuleOperation<P, R, F, C>,
    Op::State: Clone,
    F: ?Sized,
    C: ?Sized,
    I: IntoIterator<Item = Rule<P, R>>,
{
    OperateLazy {
        inner: LazyFold::new(
            rules.into_iter(),
            config.max_composition_size,
            Box::new(move || operation.init()),
            Box::new(move |state: Op::State, _index: usize, rule: &Rule<P, R>| {
                operation.step(state, rule, fact, context)
            }),
            Box::new(move |state: Op::State| operation.finalize(state)),
            hooks,
        ),
        config,
    }
}

/// Iterator returned by [`operate_lazy`]
pub struct OperateLazy<'a, I, P, R, S, O> {
    inner: LazyFold<'a, I, Rule<P, R>, S, O>,
    config: &'a EvalConfig,
}

impl<'a, I, P, R, S, O> Iterator for OperateLazy<'a, I, P, R, S, O>
where
    I: Iterator<Item = Rule<P, R>>,
    S: Clone,
{
    type Item = Result<Outcome<S, O>, RuleFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let config = self.config;
        self.inner.next().map(|item| item.map_err(|err| fold_failure(err, config)))
    }
}

/// Collect the result of the first matching rule and stop
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl<F, C, R> RuleOperation<Predicate<F>, R, F, C> for FirstMatch
where
    F: ?Sized + 'static,
    C: ?Sized,
    R: Clone,
{
    type State = Option<R>;
    type Output = Option<R>;

    fn init(&self) -> Result<Option<R>, BoxError> {
        Ok(None)
    }

    fn step(
        &self,
        state: Option<R>,
        rule: &Rule<Predicate<F>, R>,
        fact: &F,
        _context: &C,
    ) -> Result<Step<Option<R>>, BoxError> {
        Ok(if rule.predicate().test(fact)? {
            Step::Break(Some(rule.result().clone()))
        } else {
            Step::Continue(state)
        })
    }

    fn finalize(&self, state: Option<R>) -> Result<Option<R>, BoxError> {
        Ok(state)
    }
}

/// Collect the results of every matching rule, in rule order
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMatches;

impl<F, C, R> RuleOperation<Predicate<F>, R, F, C> for AllMatches
where
    F: ?Sized + 'static,
    C: ?Sized,
    R: Clone,
{
    type State = Vec<R>;
    type Output = Vec<R>;

    fn init(&self) -> Result<Vec<R>, BoxError> {
        Ok(Vec::new())
    }

    fn step(
        &self,
        mut state: Vec<R>,
        rule: &Rule<Predicate<F>, R>,
        fact: &F,
        _context: &C,
    ) -> Result<Step<Vec<R>>, BoxError> {
        if rule.predicate().test(fact)? {
            state.push(rule.result().clone());
        }
        Ok(state.into())
    }

    fn finalize(&self, state: Vec<R>) -> Result<Vec<R>, BoxError> {
        Ok(state)
    }
}
