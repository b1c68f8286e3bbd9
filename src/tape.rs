//! This module defines the `Tape`, a growable buffer of raw unary cells.
//!
//! The tape knows nothing about symbols: it stores `'1'` and `'0'` cells, reads tokens by
//! scanning forward to the next terminator, splices replacement tokens of any length and
//! pads itself with blank tokens whenever the head wanders past either end.

use crate::types::{Direction, UtmError};
use crate::unary::{UnaryToken, TERMINATOR};
use std::fmt;

/// A logically infinite tape of unary cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<char>,
    blank: UnaryToken,
    padding: usize,
    origin: usize,
}

impl Tape {
    /// Creates a tape holding `padding` blank tokens on each side of an empty input.
    pub fn new(blank: UnaryToken, padding: usize) -> Self {
        Self::with_input(blank, padding, &[])
    }

    /// Creates a tape with `input` written between two runs of `padding` blank tokens.
    ///
    /// The first cell of the input is the tape's origin, the canonical start offset for
    /// the head.
    pub fn with_input(blank: UnaryToken, padding: usize, input: &[UnaryToken]) -> Self {
        let padding = padding.max(1);
        let mut cells = Vec::new();

        cells.extend(blank_cells(blank, padding));
        let origin = cells.len();
        for token in input {
            cells.extend(token.cells());
        }
        cells.extend(blank_cells(blank, padding));

        Self {
            cells,
            blank,
            padding,
            origin,
        }
    }

    /// Creates an empty, unpadded tape meant to be appended to.
    pub fn empty(blank: UnaryToken) -> Self {
        Self {
            cells: Vec::new(),
            blank,
            padding: 1,
            origin: 0,
        }
    }

    /// Reads the token starting at `at`.
    ///
    /// # Returns
    ///
    /// * `Ok((token, length))` where `length` is the number of cells scanned, terminator included.
    /// * `Err(UtmError::OutOfBounds)` if no terminator is found before the end of the tape.
    pub fn read_token(&self, at: usize) -> Result<(UnaryToken, usize), UtmError> {
        let out_of_bounds = UtmError::OutOfBounds {
            at,
            len: self.cells.len(),
        };

        let span = self
            .cells
            .get(at..)
            .ok_or(out_of_bounds.clone())?
            .iter()
            .position(|&c| c == TERMINATOR)
            .ok_or(out_of_bounds)?;

        Ok((UnaryToken::from_ones(span), span + 1))
    }

    /// Replaces the `replace` cells starting at `at` with `token`.
    ///
    /// Everything to the right of the splice shifts by `token.len() - replace`.
    pub fn write_token(
        &mut self,
        at: usize,
        replace: usize,
        token: &UnaryToken,
    ) -> Result<(), UtmError> {
        let end = at
            .checked_add(replace)
            .filter(|&end| end <= self.cells.len())
            .ok_or(UtmError::OutOfBounds {
                at,
                len: self.cells.len(),
            })?;

        if token.len() > replace {
            self.reserve(token.len() - replace)?;
        }
        self.cells.splice(at..end, token.cells());

        Ok(())
    }

    /// Moves `head` by `distance` cells in `direction` and returns the new position.
    ///
    /// Heads move by whole tokens, so `distance` is the length of the token that was just
    /// written. Moving left past the first cell grows the tape on the left; the returned
    /// position is expressed in the grown tape's coordinates.
    pub fn move_head(
        &mut self,
        head: usize,
        direction: Direction,
        distance: usize,
    ) -> Result<usize, UtmError> {
        match direction {
            Direction::Right => head.checked_add(distance).ok_or(UtmError::TapeExhausted(head)),
            Direction::Left => match head.checked_sub(distance) {
                Some(head) => Ok(head),
                None => {
                    let shift = self.grow_left(distance - head)?;
                    Ok(head + shift - distance)
                }
            },
        }
    }

    /// Appends blank tokens until the tape is longer than `min_len` cells.
    pub fn grow_right(&mut self, min_len: usize) -> Result<(), UtmError> {
        let missing = min_len.saturating_sub(self.cells.len()) + 1;
        let tokens = self.padding.max(missing.div_ceil(self.blank.len()));

        self.reserve(tokens * self.blank.len())?;
        self.cells.extend(blank_cells(self.blank, tokens));

        log::debug!(
            "Tape grown right by {} blank tokens to {} cells",
            tokens,
            self.cells.len()
        );

        Ok(())
    }

    /// Prepends at least `min_cells` cells worth of blank tokens.
    ///
    /// Returns the number of cells every existing position shifted by.
    pub fn grow_left(&mut self, min_cells: usize) -> Result<usize, UtmError> {
        let tokens = self.padding.max(min_cells.div_ceil(self.blank.len()));
        let shift = tokens * self.blank.len();

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(self.cells.len() + shift)
            .map_err(|_| UtmError::TapeExhausted(self.cells.len()))?;
        cells.extend(blank_cells(self.blank, tokens));
        cells.append(&mut self.cells);

        self.cells = cells;
        self.origin += shift;

        log::debug!(
            "Tape grown left by {} blank tokens to {} cells",
            tokens,
            self.cells.len()
        );

        Ok(shift)
    }

    /// Appends a token at the end of the tape.
    pub fn append(&mut self, token: &UnaryToken) -> Result<(), UtmError> {
        self.reserve(token.len())?;
        self.cells.extend(token.cells());
        Ok(())
    }

    /// Appends `count` bare terminators at the end of the tape.
    pub fn append_gap(&mut self, count: usize) -> Result<(), UtmError> {
        self.reserve(count)?;
        self.cells.extend(std::iter::repeat_n(TERMINATOR, count));
        Ok(())
    }

    /// Returns the raw cells of the tape.
    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The token used for blank padding.
    pub fn blank(&self) -> UnaryToken {
        self.blank
    }

    /// Index of the cell where the input started.
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Converts an index into a position relative to the origin.
    pub fn position(&self, head: usize) -> isize {
        head as isize - self.origin as isize
    }

    /// Returns the tape contents without the trailing blank padding.
    pub fn contents(&self) -> String {
        let blank = self.blank.to_string();
        self.to_string().trim_end_matches(blank.as_str()).to_string()
    }

    fn reserve(&mut self, additional: usize) -> Result<(), UtmError> {
        self.cells
            .try_reserve(additional)
            .map_err(|_| UtmError::TapeExhausted(self.cells.len()))
    }
}

impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

fn blank_cells(blank: UnaryToken, count: usize) -> impl Iterator<Item = char> {
    std::iter::repeat_n(blank, count).flat_map(|token| token.cells())
}
