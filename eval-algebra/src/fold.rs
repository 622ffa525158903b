//! Fold engine shared by the predicate and rule algebras
//!
//! A fold is `init`, then one `step` per element, then `finalize`. The
//! eager driver checks emptiness and the size limit before any
//! caller-supplied function runs. The lazy driver pulls one element per
//! `next()` and never touches the source again once it has halted,
//! failed, or been dropped.

use crate::boundary::{guard, isolate, Fault, HookResult};
use crate::error::BoxError;

/// Control value returned by a step
#[derive(Debug, Clone, PartialEq)]
pub enum Step<S> {
    /// Keep folding
    Continue(S),
    /// Stop after this element and finalize
    Break(S),
}

impl<S> Step<S> {
    /// The carried state
    pub fn into_state(self) -> S {
        match self {
            Step::Continue(state) | Step::Break(state) => state,
        }
    }

    /// Whether evaluation stops here
    pub fn is_break(&self) -> bool {
        matches!(self, Step::Break(_))
    }
}

impl<S> From<S> for Step<S> {
    fn from(state: S) -> Self {
        Step::Continue(state)
    }
}

/// Observability callbacks around a fold.
///
/// Hook results are discarded: an error or panic is logged and the fold
/// carries on as if the hook had succeeded.
pub trait Hooks<S, O> {
    /// Called before each step
    fn before_step(&self, _index: usize, _state: &S) -> HookResult {
        Ok(())
    }

    /// Called after each successful step with the new state
    fn after_step(&self, _index: usize, _state: &S) -> HookResult {
        Ok(())
    }

    /// Called with the finalized output
    fn after_finalize(&self, _output: &O) -> HookResult {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<S, O> Hooks<S, O> for NoHooks {}

/// One item produced by a lazy fold
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<S, O> {
    /// A step ran and evaluation continues
    Stepped {
        /// Element position
        index: usize,
        /// State after the step
        state: S,
    },
    /// A step ran and asked to stop
    Halted {
        /// Element position
        index: usize,
        /// State after the step
        state: S,
    },
    /// The fold finished with this output
    Finished(O),
}

impl<S, O> Outcome<S, O> {
    /// The output, if this is the final outcome
    pub fn into_output(self) -> Option<O> {
        match self {
            Outcome::Finished(output) => Some(output),
            _ => None,
        }
    }
}

/// Why a fold stopped without an output
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FoldError {
    Empty,
    LimitExceeded { limit: usize },
    Init(Fault),
    Step { index: usize, fault: Fault },
    Finalize { index: usize, fault: Fault },
}

/// Eagerly fold a slice
pub(crate) fn run<T, S, O>(
    items: &[T],
    limit: Option<usize>,
    init: impl FnOnce() -> Result<S, BoxError>,
    mut step: impl FnMut(S, usize, &T) -> Result<Step<S>, BoxError>,
    finalize: impl FnOnce(S) -> Result<O, BoxError>,
    hooks: &dyn Hooks<S, O>,
) -> Result<O, FoldError> {
    if items.is_empty() {
        return Err(FoldError::Empty);
    }
    if let Some(limit) = limit.filter(|limit| items.len() > *limit) {
        return Err(FoldError::LimitExceeded { limit });
    }

    let mut state = guard(init).map_err(FoldError::Init)?;
    let mut last = 0;

    for (index, item) in items.iter().enumerate() {
        last = index;
        isolate("before_step", || hooks.before_step(index, &state));

        let next = guard(|| step(state, index, item))
            .map_err(|fault| FoldError::Step { index, fault })?;
        let halted = next.is_break();
        state = next.into_state();

        isolate("after_step", || hooks.after_step(index, &state));
        if halted {
            break;
        }
    }

    let output =
        guard(|| finalize(state)).map_err(|fault| FoldError::Finalize { index: last, fault })?;
    isolate("after_finalize", || hooks.after_finalize(&output));
    Ok(output)
}

enum Phase<S> {
    Pending,
    Running(S),
    Finalizing(S),
    Done,
}

type InitFn<'a, S> = Box<dyn FnOnce() -> Result<S, BoxError> + 'a>;
type StepFn<'a, T, S> = Box<dyn FnMut(S, usize, &T) -> Result<Step<S>, BoxError> + 'a>;
type FinalizeFn<'a, S, O> = Box<dyn FnOnce(S) -> Result<O, BoxError> + 'a>;

/// Pull-based fold over an iterator
pub(crate) struct LazyFold<'a, I, T, S, O> {
    source: I,
    phase: Phase<S>,
    processed: usize,
    limit: Option<usize>,
    init: Option<InitFn<'a, S>>,
    step: StepFn<'a, T, S>,
    finalize: Option<FinalizeFn<'a, S, O>>,
    hooks: &'a dyn Hooks<S, O>,
}

impl<'a, I, T, S, O> LazyFold<'a, I, T, S, O>
where
    I: Iterator<Item = T>,
    S: Clone,
{
    pub(crate) fn new(
        source: I,
        limit: Option<usize>,
        init: InitFn<'a, S>,
        step: StepFn<'a, T, S>,
        finalize: FinalizeFn<'a, S, O>,
        hooks: &'a dyn Hooks<S, O>,
    ) -> Self {
        Self {
            source,
            phase: Phase::Pending,
            processed: 0,
            limit,
            init: Some(init),
            step,
            finalize: Some(finalize),
            hooks,
        }
    }

    fn within_limit(&self) -> bool {
        self.limit.map_or(true, |limit| self.processed < limit)
    }

    fn process(&mut self, state: S, item: T) -> Result<Outcome<S, O>, FoldError> {
        let index = self.processed;
        let hooks = self.hooks;
        isolate("before_step", || hooks.before_step(index, &state));

        let step = &mut self.step;
        let next =
            guard(|| step(state, index, &item)).map_err(|fault| FoldError::Step { index, fault })?;
        self.processed += 1;

        match next {
            Step::Continue(state) => {
                isolate("after_step", || hooks.after_step(index, &state));
                self.phase = Phase::Running(state.clone());
                Ok(Outcome::Stepped { index, state })
            }
            Step::Break(state) => {
                isolate("after_step", || hooks.after_step(index, &state));
                self.phase = Phase::Finalizing(state.clone());
                Ok(Outcome::Halted { index, state })
            }
        }
    }

    fn finish(&mut self, state: S) -> Option<Result<Outcome<S, O>, FoldError>> {
        let finalize = self.finalize.take()?;
        let index = self.processed.saturating_sub(1);

        Some(match guard(|| finalize(state)) {
            Ok(output) => {
                let hooks = self.hooks;
                isolate("after_finalize", || hooks.after_finalize(&output));
                Ok(Outcome::Finished(output))
            }
            Err(fault) => Err(FoldError::Finalize { index, fault }),
        })
    }
}

impl<'a, I, T, S, O> Iterator for LazyFold<'a, I, T, S, O>
where
    I: Iterator<Item = T>,
    S: Clone,
{
    type Item = Result<Outcome<S, O>, FoldError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Any path that does not set a new phase leaves the fold Done.
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Done => None,
            Phase::Pending => {
                let Some(item) = self.source.next() else {
                    return Some(Err(FoldError::Empty));
                };
                if let Some(limit) = self.limit.filter(|limit| *limit == 0) {
                    return Some(Err(FoldError::LimitExceeded { limit }));
                }
                let init = self.init.take()?;
                let state = match guard(init) {
                    Ok(state) => state,
                    Err(fault) => return Some(Err(FoldError::Init(fault))),
                };
                Some(self.process(state, item))
            }
            Phase::Running(state) => match self.source.next() {
                None => self.finish(state),
                Some(item) if self.within_limit() => Some(self.process(state, item)),
                Some(_) => Some(Err(FoldError::LimitExceeded {
                    limit: self.processed,
                })),
            },
            Phase::Finalizing(state) => self.finish(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn sum_until(
        stop_at: Option<i32>,
    ) -> impl FnMut(i32, usize, &i32) -> Result<Step<i32>, BoxError> {
        move |acc, _, item| {
            let acc = acc + item;
            Ok(match stop_at {
                Some(stop) if *item == stop => Step::Break(acc),
                _ => Step::Continue(acc),
            })
        }
    }

    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl Hooks<i32, i32> for Recorder {
        fn before_step(&self, index: usize, _state: &i32) -> HookResult {
            self.events.borrow_mut().push(format!("before:{}", index));
            Err("hook refuses".into())
        }

        fn after_step(&self, index: usize, state: &i32) -> HookResult {
            self.events.borrow_mut().push(format!("after:{}={}", index, state));
            Ok(())
        }

        fn after_finalize(&self, output: &i32) -> HookResult {
            self.events.borrow_mut().push(format!("final={}", output));
            panic!("observer crashed");
        }
    }

    #[test]
    fn test_eager_fold_sums() {
        let out = run(&[1, 2, 3], None, || Ok(0), sum_until(None), Ok, &NoHooks);
        assert_eq!(out, Ok(6));
    }

    #[test]
    fn test_eager_break_skips_rest() {
        let calls = Cell::new(0);
        let out = run(
            &[1, 2, 3, 4],
            None,
            || Ok(0),
            |acc, _, item: &i32| {
                calls.set(calls.get() + 1);
                Ok(if *item == 2 { Step::Break(acc + item) } else { Step::Continue(acc + item) })
            },
            Ok,
            &NoHooks,
        );
        assert_eq!(out, Ok(3));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_eager_guards_run_before_init() {
        let inits = Cell::new(0);
        let init = || {
            inits.set(inits.get() + 1);
            Ok(0)
        };
        assert_eq!(
            run(&[1, 2, 3], Some(2), init, sum_until(None), Ok, &NoHooks),
            Err(FoldError::LimitExceeded { limit: 2 })
        );
        assert_eq!(
            run::<i32, i32, i32>(&[], None, || Ok(0), sum_until(None), Ok, &NoHooks),
            Err(FoldError::Empty)
        );
        assert_eq!(inits.get(), 0);
    }

    #[test]
    fn test_eager_finalize_error_reports_last_index() {
        let finalize = |_: i32| -> Result<i32, BoxError> { Err("nope".into()) };
        let out = run(&[1, 2], None, || Ok(0), sum_until(None), finalize, &NoHooks);
        assert!(matches!(out, Err(FoldError::Finalize { index: 1, .. })));
    }

    #[test]
    fn test_hook_failures_do_not_change_result() {
        let recorder = Recorder {
            events: RefCell::new(Vec::new()),
        };
        let out = run(&[1, 2], None, || Ok(0), sum_until(None), Ok, &recorder);
        assert_eq!(out, Ok(3));
        assert_eq!(
            *recorder.events.borrow(),
            vec!["before:0", "after:0=1", "before:1", "after:1=3", "final=3"]
        );
    }

    #[test]
    fn test_lazy_yields_each_step_then_output() {
        let fold = LazyFold::new(
            vec![1, 2, 3].into_iter(),
            None,
            Box::new(|| Ok(0)),
            Box::new(sum_until(None)),
            Box::new(|total: i32| Ok(total)),
            &NoHooks,
        );
        let outcomes: Vec<_> = fold.collect();
        assert_eq!(
            outcomes,
            vec![
                Ok(Outcome::Stepped { index: 0, state: 1 }),
                Ok(Outcome::Stepped { index: 1, state: 3 }),
                Ok(Outcome::Stepped { index: 2, state: 6 }),
                Ok(Outcome::Finished(6)),
            ]
        );
    }

    #[test]
    fn test_lazy_break_stops_pulling() {
        let pulled = Cell::new(0);
        let source = (1..).inspect(|_| pulled.set(pulled.get() + 1));
        let fold = LazyFold::new(
            source,
            None,
            Box::new(|| Ok(0)),
            Box::new(sum_until(Some(5))),
            Box::new(|total: i32| Ok(total)),
            &NoHooks,
        );
        let outcomes: Vec<_> = fold.collect();
        assert_eq!(outcomes.last(), Some(&Ok(Outcome::Finished(15))));
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn test_lazy_limit_reports_after_partial_work() {
        let fold = LazyFold::new(
            1..,
            Some(3),
            Box::new(|| Ok(0)),
            Box::new(sum_until(None)),
            Box::new(|total: i32| Ok(total)),
            &NoHooks,
        );
        let outcomes: Vec<_> = fold.collect();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[3], Err(FoldError::LimitExceeded { limit: 3 }));
    }

    #[test]
    fn test_lazy_empty_source() {
        let mut fold = LazyFold::new(
            std::iter::empty::<i32>(),
            None,
            Box::new(|| Ok(0)),
            Box::new(sum_until(None)),
            Box::new(|total: i32| Ok(total)),
            &NoHooks,
        );
        assert_eq!(fold.next(), Some(Err(FoldError::Empty)));
        assert_eq!(fold.next(), None);
    }

    #[test]
    fn test_lazy_step_error_ends_stream() {
        let pulled = Cell::new(0);
        let source = (1..).inspect(|_| pulled.set(pulled.get() + 1));
        let fold = LazyFold::new(
            source,
            None,
            Box::new(|| Ok(0)),
            Box::new(|acc: i32, index: usize, item: &i32| {
                if index == 2 {
                    Err("bad element".into())
                } else {
                    Ok(Step::Continue(acc + item))
                }
            }),
            Box::new(|total: i32| Ok(total)),
            &NoHooks,
        );
        let outcomes: Vec<_> = fold.collect();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[2], Err(FoldError::Step { index: 2, .. })));
        assert_eq!(pulled.get(), 3);
    }
}
