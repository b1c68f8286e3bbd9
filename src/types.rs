//! This module defines the core data structures and types used throughout the universal
//! machine, including symbols, machine configurations, step records, verdicts and error types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analyzer::analyze;
use crate::Rule;

/// The literal used for the blank tape symbol.
pub const BLANK_LITERAL: char = 'B';
/// Number of blank tokens padded on each side of a freshly created tape.
pub const DEFAULT_PADDING: usize = 48;
/// The maximum allowed size for a machine program in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB

/// A symbol that may be written on the work tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TapeSymbol {
    /// The binary digit `0`.
    Zero,
    /// The binary digit `1`.
    One,
    /// The blank marker `B`.
    Blank,
}

/// Represents the possible directions the head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one token to the left.
    Left,
    /// Move the head one token to the right.
    Right,
}

/// Identifier of a machine state, written `qN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u32);

/// Any value the unary codec knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Tape(TapeSymbol),
    Direction(Direction),
    State(StateId),
}

/// The class a token is expected to belong to when it is decoded.
///
/// Digit and direction tokens share the same encodings, so the caller has to
/// say which one it is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    TapeSymbol,
    Direction,
    State,
}

impl Symbol {
    /// Returns the class this symbol belongs to.
    pub fn class(&self) -> SymbolClass {
        match self {
            Symbol::Tape(_) => SymbolClass::TapeSymbol,
            Symbol::Direction(_) => SymbolClass::Direction,
            Symbol::State(_) => SymbolClass::State,
        }
    }
}

impl fmt::Display for TapeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literal = match self {
            TapeSymbol::Zero => '0',
            TapeSymbol::One => '1',
            TapeSymbol::Blank => BLANK_LITERAL,
        };
        write!(f, "{literal}")
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "L"),
            Direction::Right => write!(f, "R"),
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Tape(symbol) => symbol.fmt(f),
            Symbol::Direction(direction) => direction.fmt(f),
            Symbol::State(state) => state.fmt(f),
        }
    }
}

impl TapeSymbol {
    /// Converts a single input character into a tape symbol, if it is one.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(TapeSymbol::Zero),
            '1' => Some(TapeSymbol::One),
            BLANK_LITERAL => Some(TapeSymbol::Blank),
            _ => None,
        }
    }
}

impl FromStr for TapeSymbol {
    type Err = UtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                TapeSymbol::from_char(c).ok_or_else(|| UtmError::UnrecognizedSymbol(s.into()))
            }
            _ => Err(UtmError::UnrecognizedSymbol(s.into())),
        }
    }
}

impl FromStr for Direction {
    type Err = UtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(Direction::Left),
            "R" => Ok(Direction::Right),
            _ => Err(UtmError::UnrecognizedSymbol(s.into())),
        }
    }
}

impl FromStr for StateId {
    type Err = UtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('q')
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(StateId)
            .ok_or_else(|| UtmError::UnrecognizedSymbol(s.into()))
    }
}

/// The effect of a transition: the state to enter, the symbol to write and where to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub next: StateId,
    pub write: TapeSymbol,
    pub direction: Direction,
}

/// The transition relation, a partial function from `(state, read symbol)` to an [`Action`].
pub type Transitions = BTreeMap<(StateId, TapeSymbol), Action>;

/// A complete machine configuration.
///
/// A `MachineConfig` can only be built through [`MachineConfig::new`], which runs the
/// analyzer, so every value of this type satisfies the invariants checked there:
/// the initial and final states are declared, the blank is part of the alphabet and
/// every transition only mentions declared states and symbols.
///
/// The optional input alphabet restricts which symbols an input word may contain. It is
/// not part of the unary description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    states: BTreeSet<StateId>,
    alphabet: BTreeSet<TapeSymbol>,
    blank: TapeSymbol,
    initial: StateId,
    finals: BTreeSet<StateId>,
    transitions: Transitions,
    input_alphabet: Option<BTreeSet<TapeSymbol>>,
}

impl MachineConfig {
    /// Creates a validated machine configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(MachineConfig)` if the configuration passes analysis.
    /// * `Err(UtmError::InvalidConfig)` describing the first violated rule otherwise.
    pub fn new(
        states: BTreeSet<StateId>,
        alphabet: BTreeSet<TapeSymbol>,
        blank: TapeSymbol,
        initial: StateId,
        finals: BTreeSet<StateId>,
        transitions: Transitions,
    ) -> Result<Self, UtmError> {
        let config = Self {
            states,
            alphabet,
            blank,
            initial,
            finals,
            transitions,
            input_alphabet: None,
        };

        analyze(&config)?;

        Ok(config)
    }

    /// Restricts input words to `symbols`, which must be part of the alphabet.
    pub fn with_input_alphabet(self, symbols: BTreeSet<TapeSymbol>) -> Result<Self, UtmError> {
        let config = Self {
            input_alphabet: Some(symbols),
            ..self
        };

        analyze(&config)?;

        Ok(config)
    }

    pub fn states(&self) -> &BTreeSet<StateId> {
        &self.states
    }

    pub fn alphabet(&self) -> &BTreeSet<TapeSymbol> {
        &self.alphabet
    }

    /// Returns the declared input alphabet, if the machine has one.
    pub fn input_alphabet(&self) -> Option<&BTreeSet<TapeSymbol>> {
        self.input_alphabet.as_ref()
    }

    /// Checks whether `symbol` may appear in an input word.
    ///
    /// Without a declared input alphabet every tape symbol may.
    pub fn accepts_input(&self, symbol: TapeSymbol) -> bool {
        match &self.input_alphabet {
            Some(symbols) => symbols.contains(&symbol),
            None => self.alphabet.contains(&symbol),
        }
    }

    pub fn blank(&self) -> TapeSymbol {
        self.blank
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn finals(&self) -> &BTreeSet<StateId> {
        &self.finals
    }

    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    /// Returns the action defined for `(state, symbol)`, if any.
    pub fn action(&self, state: StateId, symbol: TapeSymbol) -> Option<&Action> {
        self.transitions.get(&(state, symbol))
    }

    /// Checks whether `state` is one of the final (accepting) states.
    pub fn is_final(&self, state: StateId) -> bool {
        self.finals.contains(&state)
    }
}

/// A named machine configuration together with an optional default input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// The name of the program.
    pub name: String,
    /// The machine itself.
    pub config: MachineConfig,
    /// Input used when the caller does not supply one.
    pub input: Option<String>,
}

impl Program {
    /// Returns the default input, or an empty string when the program has none.
    pub fn default_input(&self) -> &str {
        self.input.as_deref().unwrap_or_default()
    }
}

/// A transition that has just been applied, together with the head position it left behind.
///
/// This is everything an observer needs to reconstruct a trace of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub from: StateId,
    pub read: TapeSymbol,
    pub to: StateId,
    pub write: TapeSymbol,
    pub direction: Direction,
    /// Head position after the move.
    pub head: usize,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) -> ({}, {}, {})",
            self.from, self.read, self.to, self.write, self.direction
        )
    }
}

/// Why a run ended in rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// No transition is defined for the current state and the symbol under the head.
    NoTransition { state: StateId, symbol: TapeSymbol },
    /// The input contained a character outside the declared alphabet.
    InvalidInputSymbol(char),
    /// The token under the head does not decode to a symbol of the declared alphabet.
    InvalidTapeSymbol { head: usize, token: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoTransition { state, symbol } => {
                write!(f, "no transition for ({state}, {symbol})")
            }
            Rejection::InvalidInputSymbol(c) => write!(f, "invalid input symbol {c:?}"),
            Rejection::InvalidTapeSymbol { head, token } => {
                write!(f, "invalid tape token {token} at {head}")
            }
        }
    }
}

/// The final verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
    /// The configured step ceiling was reached before any other verdict.
    StepLimitExceeded(usize),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::Rejected(reason) => write!(f, "rejected ({reason})"),
            Verdict::StepLimitExceeded(limit) => write!(f, "step limit of {limit} exceeded"),
        }
    }
}

/// Represents the outcome of a single call to `step_once`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A transition was applied and execution may continue.
    Continue(StepRecord),
    /// The machine has halted with the given verdict.
    Halt(Verdict),
}

/// Everything a display needs once a run is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub verdict: Verdict,
    /// State the machine ended in.
    pub state: StateId,
    /// Final tape contents with trailing blank padding removed.
    pub tape: String,
    /// Final head position, as an index into the tape.
    pub head: usize,
    /// Final head position relative to where the input started.
    pub position: isize,
    /// Number of transitions applied.
    pub steps: usize,
}

/// Represents the errors that can occur while encoding, decoding, loading or running a machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UtmError {
    /// A value outside the codec's known symbol set.
    #[error("Unrecognized symbol: {0}")]
    UnrecognizedSymbol(String),
    /// A serialized machine description failed its delimiter, count or token checks.
    #[error("Malformed description: {0}")]
    MalformedDescription(String),
    /// A token scan or splice ran past the end of the tape.
    #[error("Tape access out of bounds at {at} (tape length {len})")]
    OutOfBounds { at: usize, len: usize },
    /// The tape could not grow any further.
    #[error("Tape exhausted: unable to grow beyond {0} cells")]
    TapeExhausted(usize),
    /// The machine configuration violates one of its invariants.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Indicates an error during the parsing of a program definition.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates an error related to file system operations or file contents.
    #[error("File error: {0}")]
    FileError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_parsing() {
        assert_eq!("0".parse::<TapeSymbol>(), Ok(TapeSymbol::Zero));
        assert_eq!("B".parse::<TapeSymbol>(), Ok(TapeSymbol::Blank));
        assert_eq!("R".parse::<Direction>(), Ok(Direction::Right));
        assert_eq!("q12".parse::<StateId>(), Ok(StateId(12)));

        assert!("2".parse::<TapeSymbol>().is_err());
        assert!("01".parse::<TapeSymbol>().is_err());
        assert!("S".parse::<Direction>().is_err());
        assert!("q".parse::<StateId>().is_err());
        assert!("q-1".parse::<StateId>().is_err());
        assert!("s1".parse::<StateId>().is_err());
    }

    #[test]
    fn test_display_matches_literals() {
        for literal in ["0", "1", "B"] {
            assert_eq!(literal.parse::<TapeSymbol>().unwrap().to_string(), literal);
        }
        assert_eq!(StateId(7).to_string(), "q7");
        assert_eq!(Direction::Left.to_string(), "L");
    }

    #[test]
    fn test_step_record_display() {
        let record = StepRecord {
            from: StateId(0),
            read: TapeSymbol::One,
            to: StateId(1),
            write: TapeSymbol::Zero,
            direction: Direction::Right,
            head: 4,
        };

        assert_eq!(record.to_string(), "(q0, 1) -> (q1, 0, R)");
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = Verdict::Rejected(Rejection::InvalidInputSymbol('x'));
        let json = serde_json::to_string(&verdict).unwrap();
        let back: Verdict = serde_json::from_str(&json).unwrap();

        assert_eq!(back, verdict);
        assert!(!back.is_accepted());
    }

    #[test]
    fn test_error_display() {
        let error = UtmError::UnrecognizedSymbol("X".to_string());

        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Unrecognized symbol"));
        assert!(error_msg.contains('X'));
    }
}
