//! Predicate algebra
//!
//! Boolean tests over a fact, AND/OR/NOT composition with short-circuit
//! evaluation, eager and streaming batch evaluation, and a general fold
//! (`operate` / `operate_lazy`) over a predicate list.

use crate::boundary::guard;
use crate::config::EvalConfig;
use crate::error::{BoxError, Diagnostic, PredicateFailure};
use crate::fold::{self, FoldError, Hooks, LazyFold, Outcome, Step};
use std::fmt;
use std::sync::Arc;

type TestFn<F> = dyn Fn(&F) -> Result<bool, BoxError> + Send + Sync;

/// Boolean test over a fact
pub struct Predicate<F: ?Sized> {
    test: Arc<TestFn<F>>,
}

impl<F: ?Sized + 'static> Predicate<F> {
    /// Wrap a test function. Any [`Truthy`] return value is accepted and
    /// coerced to a boolean; an `Err` return counts as a raised error.
    pub fn new<T, P>(test: P) -> Self
    where
        T: Truthy,
        P: Fn(&F) -> T + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(move |fact: &F| test(fact).truthy()),
        }
    }
}

impl<F: ?Sized> Predicate<F> {
    /// Run the test without an error boundary
    pub fn test(&self, fact: &F) -> Result<bool, BoxError> {
        (self.test)(fact)
    }
}

impl<F: ?Sized> Clone for Predicate<F> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

/// Conversion of a predicate's return value to a boolean
pub trait Truthy {
    /// Coerce to a boolean, or report the raised error
    fn truthy(self) -> Result<bool, BoxError>;
}

impl Truthy for bool {
    fn truthy(self) -> Result<bool, BoxError> {
        Ok(self)
    }
}

impl<T> Truthy for Option<T> {
    fn truthy(self) -> Result<bool, BoxError> {
        Ok(self.is_some())
    }
}

impl<T, E> Truthy for Result<T, E>
where
    T: Truthy,
    E: Into<BoxError>,
{
    fn truthy(self) -> Result<bool, BoxError> {
        self.map_err(Into::into)?.truthy()
    }
}

impl Truthy for &str {
    fn truthy(self) -> Result<bool, BoxError> {
        Ok(!self.is_empty())
    }
}

impl Truthy for String {
    fn truthy(self) -> Result<bool, BoxError> {
        Ok(!self.is_empty())
    }
}

impl Truthy for f64 {
    fn truthy(self) -> Result<bool, BoxError> {
        Ok(self != 0.0 && !self.is_nan())
    }
}

macro_rules! truthy_int {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn truthy(self) -> Result<bool, BoxError> {
                Ok(self != 0)
            }
        })*
    };
}

truthy_int!(i32, i64, u8, u32, u64, usize);

/// Check that a slot holds a predicate
pub fn validate<F: ?Sized>(value: Option<Predicate<F>>) -> Result<Predicate<F>, PredicateFailure> {
    value.ok_or(PredicateFailure::InvalidPredicate { index: 0 })
}

/// Collect slots, enforcing emptiness, size limit and presence in that order.
/// No predicate runs here.
fn collect<F, I, T>(
    predicates: I,
    config: &EvalConfig,
) -> Result<Vec<Predicate<F>>, PredicateFailure>
where
    F: ?Sized,
    I: IntoIterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    let slots: Vec<Option<Predicate<F>>> = predicates.into_iter().map(Into::into).collect();

    if slots.is_empty() {
        return Err(PredicateFailure::EmptyPredicates);
    }
    if let Some(limit) = config.max_composition_size.filter(|_| config.exceeds_limit(slots.len())) {
        return Err(PredicateFailure::CompositionError(Diagnostic::limit_exceeded(
            limit,
            config.error_metadata(),
        )));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(PredicateFailure::InvalidPredicate { index }))
        .collect()
}

/// True only if every predicate holds; stops at the first `false`
pub fn and<F, I, T>(predicates: I, config: &EvalConfig) -> Result<Predicate<F>, PredicateFailure>
where
    F: ?Sized + 'static,
    I: IntoIterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    let predicates = collect(predicates, config)?;
    Ok(Predicate::new(move |fact: &F| -> Result<bool, BoxError> {
        for predicate in &predicates {
            if !predicate.test(fact)? {
                return Ok(false);
            }
        }
        Ok(true)
    }))
}

/// True if any predicate holds; stops at the first `true`
pub fn or<F, I, T>(predicates: I, config: &EvalConfig) -> Result<Predicate<F>, PredicateFailure>
where
    F: ?Sized + 'static,
    I: IntoIterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    let predicates = collect(predicates, config)?;
    Ok(Predicate::new(move |fact: &F| -> Result<bool, BoxError> {
        for predicate in &predicates {
            if predicate.test(fact)? {
                return Ok(true);
            }
        }
        Ok(false)
    }))
}

/// Invert a single predicate
pub fn not<F, T>(predicate: T) -> Result<Predicate<F>, PredicateFailure>
where
    F: ?Sized + 'static,
    T: Into<Option<Predicate<F>>>,
{
    let predicate = validate(predicate.into())?;
    Ok(Predicate::new(move |fact: &F| predicate.test(fact).map(|held| !held)))
}

/// Run one predicate behind an error boundary
pub fn evaluate<F: ?Sized>(predicate: &Predicate<F>, fact: &F) -> Result<bool, PredicateFailure> {
    guard(|| predicate.test(fact))
        .map_err(|fault| PredicateFailure::EvaluationError(fault.into_diagnostic(0, None)))
}

/// Evaluate every predicate, failing fast on the first error
pub fn evaluate_all<F, I, T>(
    predicates: I,
    fact: &F,
    config: &EvalConfig,
) -> Result<Vec<bool>, PredicateFailure>
where
    F: ?Sized,
    I: IntoIterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    let predicates = collect(predicates, config)?;
    predicates
        .iter()
        .enumerate()
        .map(|(index, predicate)| {
            guard(|| predicate.test(fact)).map_err(|fault| {
                let diagnostic = fault.into_diagnostic(index, config.error_metadata());
                PredicateFailure::EvaluationError(diagnostic)
            })
        })
        .collect()
}

/// Streaming counterpart of [`evaluate_all`]
pub fn evaluate_all_iter<'a, F, I, T>(
    predicates: I,
    fact: &'a F,
    config: &'a EvalConfig,
) -> EvaluateAll<'a, I::IntoIter, F>
where
    F: ?Sized,
    I: IntoIterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    EvaluateAll {
        source: predicates.into_iter(),
        fact,
        config,
        index: 0,
        done: false,
    }
}

/// Iterator returned by [`evaluate_all_iter`].
///
/// Yields one result per predicate pulled. After the first failure it
/// ends without pulling from the source again.
pub struct EvaluateAll<'a, I, F: ?Sized> {
    source: I,
    fact: &'a F,
    config: &'a EvalConfig,
    index: usize,
    done: bool,
}

impl<'a, I, F, T> Iterator for EvaluateAll<'a, I, F>
where
    F: ?Sized,
    I: Iterator<Item = T>,
    T: Into<Option<Predicate<F>>>,
{
    type Item = Result<bool, PredicateFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(slot) = self.source.next() else {
            self.done = true;
            return (self.index == 0).then_some(Err(PredicateFailure::EmptyPredicates));
        };

        let index = self.index;
        if self.config.exceeds_limit(index + 1) {
            self.done = true;
            return Some(Err(PredicateFailure::CompositionError(Diagnostic::limit_exceeded(
                index,
                self.config.error_metadata(),
            ))));
        }

        let slot: Option<Predicate<F>> = slot.into();
        let Some(predicate) = slot else {
            self.done = true;
            return Some(Err(PredicateFailure::InvalidPredicate { index }));
        };

        self.index += 1;
        let fact = self.fact;
        match guard(|| predicate.test(fact)) {
            Ok(held) => Some(Ok(held)),
            Err(fault) => {
                self.done = true;
                Some(Err(PredicateFailure::EvaluationError(
                    fault.into_diagnostic(index, self.config.error_metadata()),
                )))
            }
        }
    }
}

/// A fold over a predicate list.
///
/// Predicates carry no short-circuit signal of their own, so a step always
/// continues; returning the new state is enough.
pub trait PredicateOperation<F: ?Sized, C: ?Sized> {
    /// Accumulated state
    type State;
    /// Final value
    type Output;

    /// Starting state
    fn init(&self) -> Result<Self::State, BoxError>;

    /// Fold one predicate into the state
    fn step(
        &self,
        state: Self::State,
        predicate: &Predicate<F>,
        fact: &F,
        context: &C,
    ) -> Result<Self::State, BoxError>;

    /// Produce the final value
    fn finalize(&self, state: Self::State) -> Result<Self::Output, BoxError>;
}

fn fold_failure(err: FoldError, config: &EvalConfig) -> PredicateFailure {
    match err {
        FoldError::Empty => PredicateFailure::EmptyPredicates,
        FoldError::LimitExceeded { limit } => PredicateFailure::CompositionError(
            Diagnostic::limit_exceeded(limit, config.error_metadata()),
        ),
        FoldError::Init(fault) => {
            PredicateFailure::CompositionError(fault.into_diagnostic(0, config.error_metadata()))
        }
        FoldError::Step { index, fault } | FoldError::Finalize { index, fault } => {
            PredicateFailure::EvaluationError(fault.into_diagnostic(index, config.error_metadata()))
        }
    }
}

/// Fold an operation over a predicate slice
pub fn operate<Op, F, C>(
    operation: &Op,
    predicates: &[Predicate<F>],
    fact: &F,
    context: &C,
    config: &EvalConfig,
    hooks: &dyn Hooks<Op::State, Op::Output>,
) -> Result<Op::Output, PredicateFailure>
where
    Op: PredicateOperation<F, C>,
    F: ?Sized,
    C: ?Sized,
{
    fold::run(
        predicates,
        config.max_composition_size,
        || operation.init(),
        |state, _, predicate| operation.step(state, predicate, fact, context).map(Step::Continue),
        |state| operation.finalize(state),
        hooks,
    )
    .map_err(|err| fold_failure(err, config))
}

/// Streaming fold over a predicate sequence.
///
/// Yields one outcome per step, then the finalized output. Nothing is
/// pulled from `predicates` beyond what the caller consumes.
pub fn operate_lazy<'a, Op, F, C, I>(
    operation: &'a Op,
    predicates: I,
    fact: &'a F,
    context: &'a C,
    config: &'a EvalConfig,
    hooks: &'a dyn Hooks<Op::State, Op::Output>,
) -> OperateLazy<'a, I::IntoIter, F, Op::State, Op::Output>
where
    Op: PredicateOperation<F, C>,
    Op::State: Clone,
    F: ?Sized,
    C: ?Sized,
    I: IntoIterator<Item = Predicate<F>>,
{
    OperateLazy {
        inner: LazyFold::new(
            predicates.into_iter(),
            config.max_composition_size,
            Box::new(move || operation.init()),
            Box::new(move |state: Op::State, _index: usize, predicate: &Predicate<F>| {
                operation.step(state, predicate, fact, context).map(Step::Continue)
            }),
            Box::new(move |state: Op::State| operation.finalize(state)),
            hooks,
        ),
        config,
    }
}

/// Iterator returned by [`operate_lazy`]
pub struct OperateLazy<'a, I, F: ?Sized, S, O> {
    inner: LazyFold<'a, I, Predicate<F>, S, O>,
    config: &'a EvalConfig,
}

impl<'a, I, F, S, O> Iterator for OperateLazy<'a, I, F, S, O>
where
    F: ?Sized,
    I: Iterator<Item = Predicate<F>>,
    S: Clone,
{
    type Item = Result<Outcome<S, O>, PredicateFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let config = self.config;
        self.inner.next().map(|item| item.map_err(|err| fold_failure(err, config)))
    }
}
