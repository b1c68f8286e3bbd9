//! This module implements the self-delimiting unary code used for every value the
//! universal machine stores on a tape.
//!
//! A token is a run of `1`s closed by a single `0`. Tape symbols, directions and state
//! identifiers all map onto such runs, so a token's meaning depends on where it is read:
//! `10` is both the digit `0` and the direction `L`, `110` both the digit `1` and `R`.

use crate::types::{Direction, StateId, Symbol, SymbolClass, TapeSymbol, UtmError};
use std::fmt;
use std::str::FromStr;

/// The cell value that closes a token.
pub const TERMINATOR: char = '0';
/// The cell value that makes up a token's body.
pub const MARK: char = '1';

/// A single unary token, stored as the number of `1`s before its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnaryToken(usize);

impl UnaryToken {
    /// Creates the token made of `ones` marks followed by the terminator.
    pub fn from_ones(ones: usize) -> Self {
        Self(ones)
    }

    /// Number of `1`s before the terminator.
    pub fn ones(&self) -> usize {
        self.0
    }

    /// Number of tape cells the token occupies.
    pub fn len(&self) -> usize {
        self.0 + 1
    }

    /// A bare terminator carries no value; inside a description it separates fields.
    pub fn is_separator(&self) -> bool {
        self.0 == 0
    }

    /// Iterates over the token's cells.
    pub fn cells(&self) -> impl Iterator<Item = char> {
        std::iter::repeat_n(MARK, self.0).chain(std::iter::once(TERMINATOR))
    }
}

impl fmt::Display for UnaryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells().try_for_each(|c| write!(f, "{c}"))
    }
}

impl FromStr for UnaryToken {
    type Err = UtmError;

    /// Parses a string of the form `1…10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_suffix(TERMINATOR)
            .filter(|body| body.chars().all(|c| c == MARK))
            .ok_or_else(|| UtmError::UnrecognizedSymbol(s.into()))?;

        Ok(Self(body.len()))
    }
}

/// Encodes a symbol into its unary token.
///
/// | symbol | token |
/// |--------|-------|
/// | `0` / `L` | `10` |
/// | `1` / `R` | `110` |
/// | `B` | `1110` |
/// | `qN` | `N+1` ones then `0` |
pub fn encode(symbol: &Symbol) -> UnaryToken {
    match symbol {
        Symbol::Tape(symbol) => encode_tape_symbol(*symbol),
        Symbol::Direction(direction) => encode_direction(*direction),
        Symbol::State(state) => encode_state(*state),
    }
}

pub fn encode_tape_symbol(symbol: TapeSymbol) -> UnaryToken {
    match symbol {
        TapeSymbol::Zero => UnaryToken(1),
        TapeSymbol::One => UnaryToken(2),
        TapeSymbol::Blank => UnaryToken(3),
    }
}

pub fn encode_direction(direction: Direction) -> UnaryToken {
    match direction {
        Direction::Left => UnaryToken(1),
        Direction::Right => UnaryToken(2),
    }
}

pub fn encode_state(state: StateId) -> UnaryToken {
    UnaryToken(state.0 as usize + 1)
}

/// Encodes a textual literal (`0`, `1`, `B`, `L`, `R` or `qN`).
///
/// # Returns
///
/// * `Ok(UnaryToken)` for a known literal.
/// * `Err(UtmError::UnrecognizedSymbol)` for anything else.
pub fn encode_literal(literal: &str) -> Result<UnaryToken, UtmError> {
    let symbol = if let Ok(symbol) = literal.parse::<TapeSymbol>() {
        Symbol::Tape(symbol)
    } else if let Ok(direction) = literal.parse::<Direction>() {
        Symbol::Direction(direction)
    } else {
        Symbol::State(literal.parse::<StateId>()?)
    };

    Ok(encode(&symbol))
}

/// Decodes a token as a member of the given symbol class.
pub fn decode(token: &UnaryToken, class: SymbolClass) -> Result<Symbol, UtmError> {
    match class {
        SymbolClass::TapeSymbol => decode_tape_symbol(token).map(Symbol::Tape),
        SymbolClass::Direction => decode_direction(token).map(Symbol::Direction),
        SymbolClass::State => decode_state(token).map(Symbol::State),
    }
}

/// Decodes a token without knowing what it stands for.
///
/// With no context the leading `1`s are counted and read as a state ordinal, so `10`
/// comes back as `q0` even when it was written as the digit `0`.
pub fn decode_untyped(token: &UnaryToken) -> Result<Symbol, UtmError> {
    decode_state(token).map(Symbol::State)
}

pub fn decode_tape_symbol(token: &UnaryToken) -> Result<TapeSymbol, UtmError> {
    match token.ones() {
        1 => Ok(TapeSymbol::Zero),
        2 => Ok(TapeSymbol::One),
        3 => Ok(TapeSymbol::Blank),
        _ => Err(UtmError::UnrecognizedSymbol(format!(
            "{token} is not a tape symbol"
        ))),
    }
}

pub fn decode_direction(token: &UnaryToken) -> Result<Direction, UtmError> {
    match token.ones() {
        1 => Ok(Direction::Left),
        2 => Ok(Direction::Right),
        _ => Err(UtmError::UnrecognizedSymbol(format!(
            "{token} is not a direction"
        ))),
    }
}

pub fn decode_state(token: &UnaryToken) -> Result<StateId, UtmError> {
    token
        .ones()
        .checked_sub(1)
        .and_then(|ordinal| u32::try_from(ordinal).ok())
        .map(StateId)
        .ok_or_else(|| UtmError::UnrecognizedSymbol(format!("{token} is not a state")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> UnaryToken {
        s.parse().unwrap()
    }

    #[test]
    fn test_encode_table() {
        assert_eq!(encode_literal("0").unwrap().to_string(), "10");
        assert_eq!(encode_literal("1").unwrap().to_string(), "110");
        assert_eq!(encode_literal("B").unwrap().to_string(), "1110");
        assert_eq!(encode_literal("L").unwrap().to_string(), "10");
        assert_eq!(encode_literal("R").unwrap().to_string(), "110");
        assert_eq!(encode_literal("q0").unwrap().to_string(), "10");
        assert_eq!(encode_literal("q3").unwrap().to_string(), "11110");
    }

    #[test]
    fn test_encode_unknown_literal() {
        for literal in ["2", "X", "", "q", "left"] {
            assert!(matches!(
                encode_literal(literal),
                Err(UtmError::UnrecognizedSymbol(_))
            ));
        }
    }

    #[test]
    fn test_round_trip_in_expected_class() {
        let mut symbols = vec![
            Symbol::Tape(TapeSymbol::Zero),
            Symbol::Tape(TapeSymbol::One),
            Symbol::Tape(TapeSymbol::Blank),
            Symbol::Direction(Direction::Left),
            Symbol::Direction(Direction::Right),
        ];
        symbols.extend((0..64).map(|n| Symbol::State(StateId(n))));

        for symbol in symbols {
            let encoded = encode(&symbol);
            assert_eq!(decode(&encoded, symbol.class()).unwrap(), symbol);
        }
    }

    #[test]
    fn test_colliding_tokens_depend_on_context() {
        let ten = token("10");

        assert_eq!(
            decode(&ten, SymbolClass::TapeSymbol).unwrap(),
            Symbol::Tape(TapeSymbol::Zero)
        );
        assert_eq!(
            decode(&ten, SymbolClass::Direction).unwrap(),
            Symbol::Direction(Direction::Left)
        );
        assert_eq!(decode_untyped(&ten).unwrap(), Symbol::State(StateId(0)));
        assert_eq!(decode_untyped(&token("110")).unwrap(), Symbol::State(StateId(1)));
    }

    #[test]
    fn test_decode_out_of_class() {
        assert!(decode(&token("11110"), SymbolClass::TapeSymbol).is_err());
        assert!(decode(&token("1110"), SymbolClass::Direction).is_err());
        assert!(decode(&token("0"), SymbolClass::State).is_err());
        assert!(decode(&token("0"), SymbolClass::TapeSymbol).is_err());
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!(token("1110").ones(), 3);
        assert_eq!(token("1110").len(), 4);
        assert!(token("0").is_separator());

        assert!("".parse::<UnaryToken>().is_err());
        assert!("11".parse::<UnaryToken>().is_err());
        assert!("1010".parse::<UnaryToken>().is_err());
        assert!("1a0".parse::<UnaryToken>().is_err());
    }
}
