//! This module implements a single step of the universal machine: read the token under the
//! head, look up the transition for it, splice the new token in and move the head.
//!
//! Transitions are always handed to the engine in unary form, either from a pre-encoded
//! table or straight from a [`DescriptionTape`], and decoded on the fly.

use crate::description::DescriptionTape;
use crate::tape::Tape;
use crate::types::{
    MachineConfig, Rejection, StateId, StepRecord, TapeSymbol, UtmError,
};
use crate::unary::{
    decode_direction, decode_state, decode_tape_symbol, encode_direction, encode_state,
    encode_tape_symbol, UnaryToken,
};
use std::collections::{BTreeMap, BTreeSet};

/// The right-hand side of a transition, still in unary form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedAction {
    pub next: UnaryToken,
    pub write: UnaryToken,
    pub direction: UnaryToken,
}

/// Transitions keyed by decoded `(state, symbol)` values, with unary actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnaryTable {
    actions: BTreeMap<(StateId, TapeSymbol), EncodedAction>,
}

impl UnaryTable {
    /// Encodes every action of `config`.
    pub fn from_config(config: &MachineConfig) -> Self {
        let actions = config
            .transitions()
            .iter()
            .map(|(&key, action)| {
                let encoded = EncodedAction {
                    next: encode_state(action.next),
                    write: encode_tape_symbol(action.write),
                    direction: encode_direction(action.direction),
                };
                (key, encoded)
            })
            .collect();

        Self { actions }
    }

    pub fn lookup(&self, state: StateId, symbol: TapeSymbol) -> Option<EncodedAction> {
        self.actions.get(&(state, symbol)).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Where the engine finds its transitions.
#[derive(Debug, Clone)]
pub enum TransitionSource {
    /// A table encoded once from the configuration.
    Table(UnaryTable),
    /// The machine's own description, scanned on every lookup.
    Description(DescriptionTape),
}

impl TransitionSource {
    pub fn lookup(
        &self,
        state: StateId,
        symbol: TapeSymbol,
    ) -> Result<Option<EncodedAction>, UtmError> {
        match self {
            TransitionSource::Table(table) => Ok(table.lookup(state, symbol)),
            TransitionSource::Description(description) => description.lookup(state, symbol),
        }
    }
}

/// The runtime configuration of a machine: its state, its work tape and its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub state: StateId,
    pub tape: Tape,
    pub head: usize,
}

impl Configuration {
    /// Places the head on the tape's origin.
    pub fn new(state: StateId, tape: Tape) -> Self {
        let head = tape.origin();
        Self { state, tape, head }
    }

    /// Reads the token under the head, growing the tape once if the scan runs off its end.
    fn read_under_head(&mut self) -> Result<(UnaryToken, usize), UtmError> {
        match self.tape.read_token(self.head) {
            Err(UtmError::OutOfBounds { .. }) => {
                self.tape.grow_right(self.head)?;
                self.tape.read_token(self.head)
            }
            result => result,
        }
    }
}

/// The result of one engine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A transition was applied.
    Continued(StepRecord),
    /// No transition could be applied.
    Halted(Rejection),
}

/// A transition matched against the token under the head but not yet applied.
struct Pending {
    symbol: TapeSymbol,
    span: usize,
    action: EncodedAction,
}

/// Applies transitions from a [`TransitionSource`] to a [`Configuration`].
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    source: TransitionSource,
    alphabet: BTreeSet<TapeSymbol>,
}

impl TransitionEngine {
    pub fn new(source: TransitionSource, alphabet: BTreeSet<TapeSymbol>) -> Self {
        Self { source, alphabet }
    }

    /// Performs one step on `config`.
    ///
    /// # Returns
    ///
    /// * `Ok(StepOutcome::Continued)` with the applied transition.
    /// * `Ok(StepOutcome::Halted)` if the token under the head is not a symbol of the
    ///   alphabet or no transition matches; `config` is left untouched.
    /// * `Err(UtmError)` if the tape cannot grow or an encoded action fails to decode.
    pub fn step(&self, config: &mut Configuration) -> Result<StepOutcome, UtmError> {
        let pending = match self.resolve(config)? {
            Ok(pending) => pending,
            Err(rejection) => return Ok(StepOutcome::Halted(rejection)),
        };

        let next = decode_state(&pending.action.next)?;
        let write = decode_tape_symbol(&pending.action.write)?;
        let direction = decode_direction(&pending.action.direction)?;

        config
            .tape
            .write_token(config.head, pending.span, &pending.action.write)?;
        config.head = config
            .tape
            .move_head(config.head, direction, pending.action.write.len())?;

        let record = StepRecord {
            from: config.state,
            read: pending.symbol,
            to: next,
            write,
            direction,
            head: config.head,
        };
        config.state = next;

        Ok(StepOutcome::Continued(record))
    }

    /// Returns the rejection the next step would halt with, without applying anything.
    ///
    /// `None` means a transition matches the token under the head. Only the tape's right
    /// padding may change, when the head sits past its end.
    pub fn rejection(&self, config: &mut Configuration) -> Result<Option<Rejection>, UtmError> {
        Ok(self.resolve(config)?.err())
    }

    fn resolve(&self, config: &mut Configuration) -> Result<Result<Pending, Rejection>, UtmError> {
        let (token, span) = config.read_under_head()?;

        let symbol = match decode_tape_symbol(&token) {
            Ok(symbol) if self.alphabet.contains(&symbol) => symbol,
            _ => {
                return Ok(Err(Rejection::InvalidTapeSymbol {
                    head: config.head,
                    token: token.to_string(),
                }))
            }
        };

        match self.source.lookup(config.state, symbol)? {
            Some(action) => Ok(Ok(Pending {
                symbol,
                span,
                action,
            })),
            None => Ok(Err(Rejection::NoTransition {
                state: config.state,
                symbol,
            })),
        }
    }

    pub fn source(&self) -> &TransitionSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::types::Direction;

    fn config() -> MachineConfig {
        parse(
            r#"
name: Engine test
states: q0, q1
alphabet: 0, 1, B
blank: B
initial: q0
final: q1
rules:
  q0:
    0 -> B, R, q0
    1 -> 0, L, q1
"#,
        )
        .unwrap()
        .config
    }

    fn token(s: &str) -> UnaryToken {
        s.parse().unwrap()
    }

    fn start(input: &[&str]) -> Configuration {
        let input: Vec<_> = input.iter().map(|s| token(s)).collect();
        Configuration::new(StateId(0), Tape::with_input(token("1110"), 2, &input))
    }

    fn engines(config: &MachineConfig) -> Vec<TransitionEngine> {
        vec![
            TransitionEngine::new(
                TransitionSource::Table(UnaryTable::from_config(config)),
                config.alphabet().clone(),
            ),
            TransitionEngine::new(
                TransitionSource::Description(DescriptionTape::from_config(config).unwrap()),
                config.alphabet().clone(),
            ),
        ]
    }

    #[test]
    fn test_unary_table() {
        let table = UnaryTable::from_config(&config());

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.lookup(StateId(0), TapeSymbol::One),
            Some(EncodedAction {
                next: token("110"),
                write: token("10"),
                direction: token("10"),
            })
        );
        assert_eq!(table.lookup(StateId(1), TapeSymbol::One), None);
    }

    #[test]
    fn test_step_splices_longer_token() {
        let config = config();

        for engine in engines(&config) {
            let mut runtime = start(&["10", "110"]);
            let origin = runtime.head;

            let outcome = engine.step(&mut runtime).unwrap();

            assert_eq!(
                outcome,
                StepOutcome::Continued(StepRecord {
                    from: StateId(0),
                    read: TapeSymbol::Zero,
                    to: StateId(0),
                    write: TapeSymbol::Blank,
                    direction: Direction::Right,
                    head: origin + 4,
                })
            );
            assert_eq!(runtime.tape.read_token(origin).unwrap(), (token("1110"), 4));
            assert_eq!(runtime.tape.read_token(runtime.head).unwrap(), (token("110"), 3));
        }
    }

    #[test]
    fn test_step_moves_left_by_written_length() {
        let config = config();

        for engine in engines(&config) {
            let mut runtime = start(&["110"]);
            let origin = runtime.head;

            let outcome = engine.step(&mut runtime).unwrap();

            assert!(matches!(outcome, StepOutcome::Continued(record) if record.to == StateId(1)));
            assert_eq!(runtime.state, StateId(1));
            assert_eq!(runtime.head, origin - 2);
            assert_eq!(runtime.tape.read_token(origin).unwrap(), (token("10"), 2));
        }
    }

    #[test]
    fn test_step_without_transition() {
        let config = config();

        for engine in engines(&config) {
            let mut runtime = start(&[]);
            let before = runtime.clone();

            let outcome = engine.step(&mut runtime).unwrap();

            assert_eq!(
                outcome,
                StepOutcome::Halted(Rejection::NoTransition {
                    state: StateId(0),
                    symbol: TapeSymbol::Blank,
                })
            );
            assert_eq!(runtime, before);
        }
    }

    #[test]
    fn test_rejection_leaves_configuration_untouched() {
        let config = config();

        for engine in engines(&config) {
            let mut runtime = start(&["10"]);
            let before = runtime.clone();

            assert_eq!(engine.rejection(&mut runtime).unwrap(), None);
            assert_eq!(runtime, before);

            runtime.state = StateId(1);
            assert_eq!(
                engine.rejection(&mut runtime).unwrap(),
                Some(Rejection::NoTransition {
                    state: StateId(1),
                    symbol: TapeSymbol::Zero,
                })
            );
        }
    }

    #[test]
    fn test_step_on_foreign_token() {
        let config = config();

        for engine in engines(&config) {
            let mut runtime = start(&["11110"]);

            let outcome = engine.step(&mut runtime).unwrap();

            assert!(matches!(
                outcome,
                StepOutcome::Halted(Rejection::InvalidTapeSymbol { token, .. }) if token == "11110"
            ));
        }
    }

    #[test]
    fn test_step_grows_when_reading_past_end() {
        let config = config();
        let engine = &engines(&config)[0];
        let mut runtime = start(&["10"]);
        runtime.head = runtime.tape.len();

        let outcome = engine.step(&mut runtime).unwrap();

        assert!(matches!(
            outcome,
            StepOutcome::Halted(Rejection::NoTransition {
                symbol: TapeSymbol::Blank,
                ..
            })
        ));
        assert!(runtime.tape.len() > runtime.head);
    }
}
