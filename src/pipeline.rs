//! Pass pipeline: orchestrates the init/before/during-line/after/before-exit
//! sequence that drives a makefile parse.

use crate::system::Error;

/// Whether a during-pass consumed a line, stopping further handlers from
/// seeing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Consumed,
    NotConsumed,
}

/// A single line handler, run in priority order for every logical line of a
/// directory's makefile. The first handler to return `Consumed` wins; a
/// line no handler recognises is silently ignored.
pub trait DuringPass<S> {
    /// Two-digit priority, lowest runs first; order is part of the contract.
    fn priority(&self) -> u8;

    fn handle(&self, state: &mut S, line: &str) -> Result<LineOutcome, Error>;
}

/// Orchestrates one parse: a set of before/during/after passes applied per
/// directory, plus before-exit passes run once after every directory has
/// been processed.
pub struct Pipeline<S> {
    before: Vec<Box<dyn Fn(&mut S) -> Result<(), Error>>>,
    during: Vec<Box<dyn DuringPass<S>>>,
    after: Vec<Box<dyn Fn(&mut S) -> Result<(), Error>>>,
}

impl<S> Default for Pipeline<S> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            during: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl<S> Pipeline<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut S) -> Result<(), Error> + 'static,
    {
        self.before.push(Box::new(f));
        self
    }

    pub fn on_after<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut S) -> Result<(), Error> + 'static,
    {
        self.after.push(Box::new(f));
        self
    }

    /// Registers a during-pass, keeping the list sorted by priority.
    pub fn during(mut self, pass: Box<dyn DuringPass<S>>) -> Self {
        self.during.push(pass);
        self.during.sort_by_key(|p| p.priority());
        self
    }

    /// The during-passes in priority order, for callers that need to drive
    /// line iteration themselves (the Kbuild directory walk caches each
    /// line's if-stack snapshot between handler runs).
    pub fn during_passes(&self) -> &[Box<dyn DuringPass<S>>] {
        &self.during
    }

    /// Runs one directory's worth of work: before-passes, then every
    /// logical line through the during-passes in priority order, then
    /// after-passes.
    pub fn run_directory<I>(&self, state: &mut S, lines: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = String>,
    {
        for pass in &self.before {
            pass(state)?;
        }
        for line in lines {
            for pass in &self.during {
                if pass.handle(state, &line)? == LineOutcome::Consumed {
                    break;
                }
            }
        }
        for pass in &self.after {
            pass(state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<String>>);

    struct FirstWins;
    impl DuringPass<Recorder> for FirstWins {
        fn priority(&self) -> u8 {
            10
        }
        fn handle(&self, state: &mut Recorder, line: &str) -> Result<LineOutcome, Error> {
            if line.starts_with("obj") {
                state.0.borrow_mut().push(format!("first:{line}"));
                return Ok(LineOutcome::Consumed);
            }
            Ok(LineOutcome::NotConsumed)
        }
    }

    struct Fallback;
    impl DuringPass<Recorder> for Fallback {
        fn priority(&self) -> u8 {
            90
        }
        fn handle(&self, state: &mut Recorder, line: &str) -> Result<LineOutcome, Error> {
            state.0.borrow_mut().push(format!("fallback:{line}"));
            Ok(LineOutcome::Consumed)
        }
    }

    #[test]
    fn first_matching_handler_wins() {
        let pipeline = Pipeline::new()
            .during(Box::new(Fallback))
            .during(Box::new(FirstWins));
        let mut state = Recorder(RefCell::new(Vec::new()));
        pipeline
            .run_directory(&mut state, vec!["obj-y += a.o".to_string(), "unrelated".to_string()])
            .unwrap();
        assert_eq!(
            state.0.into_inner(),
            vec!["first:obj-y += a.o".to_string(), "fallback:unrelated".to_string()]
        );
    }
}
