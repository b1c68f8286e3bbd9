//! This module serializes a whole [`MachineConfig`] into a single unary string and reads it
//! back, and provides the [`DescriptionTape`] the universal mode consults while running.
//!
//! Layout:
//!
//! ```text
//! 000 states 00 alphabet 00 blank 00 initial 00 finals 00 transitions 000
//! ```
//!
//! Items inside a section are separated by a single bare `0` (a `0` found where a token
//! would start). A transition item is five concatenated tokens: from-state, read symbol,
//! to-state, write symbol and direction.

use crate::engine::EncodedAction;
use crate::tape::Tape;
use crate::types::{Action, MachineConfig, StateId, TapeSymbol, Transitions, UtmError};
use crate::unary::{
    decode_direction, decode_state, decode_tape_symbol, encode_direction, encode_state,
    encode_tape_symbol, UnaryToken, MARK, TERMINATOR,
};
use std::collections::BTreeSet;

const BRACKET: &str = "000";
const SECTION_BREAK: &str = "00";
const ITEM_BREAK: &str = "0";

const SECTION_NAMES: [&str; 6] = [
    "states",
    "alphabet",
    "blank",
    "initial",
    "finals",
    "transitions",
];
const TRANSITIONS: usize = 5;
const TRANSITION_FIELDS: usize = 5;

/// A transition as stored in a description: the lookup key and its action.
pub type TransitionEntry = ((StateId, TapeSymbol), Action);

/// Encodes a machine configuration into its unary description.
///
/// Sets and transitions are written in ascending order, so equal configurations always
/// produce the same string.
pub fn encode_config(config: &MachineConfig) -> String {
    let sections = [
        encode_items(config.states().iter().map(|&s| vec![encode_state(s)])),
        encode_items(config.alphabet().iter().map(|&s| vec![encode_tape_symbol(s)])),
        encode_items([vec![encode_tape_symbol(config.blank())]]),
        encode_items([vec![encode_state(config.initial())]]),
        encode_items(config.finals().iter().map(|&s| vec![encode_state(s)])),
        encode_items(
            config
                .transitions()
                .iter()
                .map(|(&(state, symbol), action)| encode_transition(state, symbol, action).to_vec()),
        ),
    ];

    format!("{BRACKET}{}{BRACKET}", sections.join(SECTION_BREAK))
}

/// Decodes a unary description back into a machine configuration.
///
/// # Returns
///
/// * `Ok(MachineConfig)` if the description is well formed and describes a valid machine.
/// * `Err(UtmError::MalformedDescription)` naming the first problem found otherwise.
pub fn decode_config(description: &str) -> Result<MachineConfig, UtmError> {
    let cells: Vec<char> = description.trim().chars().collect();
    decode_sections(split_sections(lex(&cells)?)?)
}

/// Decodes a bare sequence of transition items separated by single bare zeros.
///
/// This is the format of the history tape.
pub fn decode_transitions(encoded: &str) -> Result<Vec<TransitionEntry>, UtmError> {
    let cells: Vec<char> = encoded.trim().chars().collect();
    let mut entries = Vec::new();
    let mut item = Vec::new();

    for Lexeme { piece, at } in lex(&cells)? {
        match piece {
            Piece::Token(token) => item.push(token),
            Piece::Gap(n) if n == ITEM_BREAK.len() && !item.is_empty() => {
                entries.push(decode_transition(&item)?);
                item.clear();
            }
            Piece::Gap(n) => {
                return Err(malformed(format!(
                    "unexpected run of {n} separators at {at}"
                )))
            }
        }
    }

    if !item.is_empty() {
        entries.push(decode_transition(&item)?);
    }

    Ok(entries)
}

/// Returns the five tokens describing one transition.
pub(crate) fn encode_transition(
    state: StateId,
    symbol: TapeSymbol,
    action: &Action,
) -> [UnaryToken; TRANSITION_FIELDS] {
    [
        encode_state(state),
        encode_tape_symbol(symbol),
        encode_state(action.next),
        encode_tape_symbol(action.write),
        encode_direction(action.direction),
    ]
}

/// A machine description written on a tape.
///
/// Transition lookups scan the transitions section of the tape itself, so a machine
/// running against a `DescriptionTape` is interpreting its own encoded program.
#[derive(Debug, Clone)]
pub struct DescriptionTape {
    tape: Tape,
    transitions_at: Option<usize>,
    config: MachineConfig,
}

impl DescriptionTape {
    /// Encodes `config` and writes it onto a fresh tape.
    pub fn from_config(config: &MachineConfig) -> Result<Self, UtmError> {
        Self::from_description(&encode_config(config))
    }

    /// Writes an existing description onto a fresh tape, validating it on the way.
    pub fn from_description(description: &str) -> Result<Self, UtmError> {
        let cells: Vec<char> = description.trim().chars().collect();
        let lexemes = lex(&cells)?;
        let sections = split_sections(lexemes.clone())?;
        let transitions_at = sections.get(TRANSITIONS).and_then(|section| section.at);
        let config = decode_sections(sections)?;

        let mut tape = Tape::empty(encode_tape_symbol(config.blank()));
        for lexeme in &lexemes {
            match lexeme.piece {
                Piece::Token(token) => tape.append(&token)?,
                Piece::Gap(n) => tape.append_gap(n)?,
            }
        }

        Ok(Self {
            tape,
            transitions_at,
            config,
        })
    }

    /// Finds the encoded action for `(state, symbol)` by scanning the description tape.
    ///
    /// Keys are compared by decoded value.
    pub fn lookup(
        &self,
        state: StateId,
        symbol: TapeSymbol,
    ) -> Result<Option<EncodedAction>, UtmError> {
        let Some(mut at) = self.transitions_at else {
            return Ok(None);
        };
        let mut fields = Vec::with_capacity(TRANSITION_FIELDS);

        loop {
            let (token, len) = self.tape.read_token(at)?;
            at += len;

            if !token.is_separator() {
                fields.push(token);
                continue;
            }

            let &[from, read, next, write, direction] = fields.as_slice() else {
                return Err(malformed(format!(
                    "transition with {} fields before {at}",
                    fields.len()
                )));
            };

            if decode_state(&from)? == state && decode_tape_symbol(&read)? == symbol {
                return Ok(Some(EncodedAction {
                    next,
                    write,
                    direction,
                }));
            }

            // A second separator closes the section.
            if self.tape.read_token(at)?.0.is_separator() {
                return Ok(None);
            }
            fields.clear();
        }
    }

    /// The configuration decoded from the tape.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Token(UnaryToken),
    /// A run of bare terminators.
    Gap(usize),
}

#[derive(Debug, Clone, Copy)]
struct Lexeme {
    piece: Piece,
    at: usize,
}

#[derive(Debug, Default)]
struct Section {
    /// Cell index of the section's first token.
    at: Option<usize>,
    items: Vec<Vec<UnaryToken>>,
}

fn malformed(message: impl Into<String>) -> UtmError {
    UtmError::MalformedDescription(message.into())
}

fn encode_items<I>(items: I) -> String
where
    I: IntoIterator<Item = Vec<UnaryToken>>,
{
    items
        .into_iter()
        .map(|tokens| tokens.iter().map(UnaryToken::to_string).collect::<String>())
        .collect::<Vec<_>>()
        .join(ITEM_BREAK)
}

/// Splits raw cells into tokens and runs of bare terminators.
fn lex(cells: &[char]) -> Result<Vec<Lexeme>, UtmError> {
    let mut lexemes = Vec::new();
    let mut ones = 0;
    let mut start = 0;
    let mut gap = 0;
    let mut gap_start = 0;

    for (i, &c) in cells.iter().enumerate() {
        match c {
            MARK => {
                if gap > 0 {
                    lexemes.push(Lexeme {
                        piece: Piece::Gap(gap),
                        at: gap_start,
                    });
                    gap = 0;
                }
                if ones == 0 {
                    start = i;
                }
                ones += 1;
            }
            TERMINATOR if ones > 0 => {
                lexemes.push(Lexeme {
                    piece: Piece::Token(UnaryToken::from_ones(ones)),
                    at: start,
                });
                ones = 0;
            }
            TERMINATOR => {
                if gap == 0 {
                    gap_start = i;
                }
                gap += 1;
            }
            other => {
                return Err(malformed(format!("unexpected character {other:?} at {i}")));
            }
        }
    }

    if ones > 0 {
        return Err(malformed(format!("unterminated token at {start}")));
    }
    if gap > 0 {
        lexemes.push(Lexeme {
            piece: Piece::Gap(gap),
            at: gap_start,
        });
    }

    Ok(lexemes)
}

/// Removes the opening and closing brackets from the outermost gaps.
fn strip_brackets(lexemes: &mut Vec<Lexeme>) -> Result<(), UtmError> {
    let bracket = BRACKET.len();
    let missing = || malformed("missing opening or closing delimiter");

    match lexemes.as_mut_slice() {
        [Lexeme {
            piece: Piece::Gap(n),
            at,
        }] if *n >= 2 * bracket => {
            *n -= 2 * bracket;
            *at += bracket;
        }
        [first, .., last] => {
            match first {
                Lexeme {
                    piece: Piece::Gap(n),
                    at,
                } if *n >= bracket => {
                    *n -= bracket;
                    *at += bracket;
                }
                _ => return Err(missing()),
            }
            match last {
                Lexeme {
                    piece: Piece::Gap(n),
                    ..
                } if *n >= bracket => *n -= bracket,
                _ => return Err(missing()),
            }
        }
        _ => return Err(missing()),
    }

    lexemes.retain(|lexeme| lexeme.piece != Piece::Gap(0));
    Ok(())
}

/// Groups lexemes into sections of items.
///
/// A gap of one separates items, a gap of `2k` closes `k` sections. Any other gap is
/// ambiguous and rejected.
fn split_sections(mut lexemes: Vec<Lexeme>) -> Result<Vec<Section>, UtmError> {
    strip_brackets(&mut lexemes)?;

    let mut sections = Vec::new();
    let mut section = Section::default();
    let mut item = Vec::new();

    for Lexeme { piece, at } in lexemes {
        match piece {
            Piece::Token(token) => {
                section.at.get_or_insert(at);
                item.push(token);
            }
            Piece::Gap(n) if n == ITEM_BREAK.len() => {
                if item.is_empty() {
                    return Err(malformed(format!("empty item at {at}")));
                }
                section.items.push(std::mem::take(&mut item));
            }
            Piece::Gap(n) if n % SECTION_BREAK.len() == 0 => {
                if !item.is_empty() {
                    section.items.push(std::mem::take(&mut item));
                }
                for _ in 0..n / SECTION_BREAK.len() {
                    sections.push(std::mem::take(&mut section));
                }
            }
            Piece::Gap(n) => {
                return Err(malformed(format!(
                    "ambiguous run of {n} separators at {at}"
                )));
            }
        }
    }

    if !item.is_empty() {
        section.items.push(item);
    }
    sections.push(section);

    Ok(sections)
}

fn decode_sections(sections: Vec<Section>) -> Result<MachineConfig, UtmError> {
    let found = sections.len();
    let [states, alphabet, blank, initial, finals, transitions]: [Section; 6] =
        sections.try_into().map_err(|_| {
            malformed(format!(
                "expected {} sections, found {found}",
                SECTION_NAMES.len()
            ))
        })?;

    let states = decode_set(&states, SECTION_NAMES[0], decode_state)?;
    let alphabet = decode_set(&alphabet, SECTION_NAMES[1], decode_tape_symbol)?;
    let blank = decode_single(&blank, SECTION_NAMES[2], decode_tape_symbol)?;
    let initial = decode_single(&initial, SECTION_NAMES[3], decode_state)?;
    let finals = decode_set(&finals, SECTION_NAMES[4], decode_state)?;

    let mut map = Transitions::new();
    for item in &transitions.items {
        let (key, action) = decode_transition(item)?;
        if map.insert(key, action).is_some() {
            return Err(malformed(format!(
                "duplicate transition for ({}, {})",
                key.0, key.1
            )));
        }
    }

    MachineConfig::new(states, alphabet, blank, initial, finals, map).map_err(|e| match e {
        UtmError::InvalidConfig(message) => malformed(message),
        other => other,
    })
}

fn decode_set<T: Ord + Copy + std::fmt::Display>(
    section: &Section,
    name: &str,
    decode: fn(&UnaryToken) -> Result<T, UtmError>,
) -> Result<BTreeSet<T>, UtmError> {
    let mut set = BTreeSet::new();

    for item in &section.items {
        let value = decode_field(item, name, decode)?;
        if !set.insert(value) {
            return Err(malformed(format!("{name}: duplicate entry {value}")));
        }
    }

    Ok(set)
}

fn decode_single<T>(
    section: &Section,
    name: &str,
    decode: fn(&UnaryToken) -> Result<T, UtmError>,
) -> Result<T, UtmError> {
    match section.items.as_slice() {
        [item] => decode_field(item, name, decode),
        items => Err(malformed(format!(
            "{name}: expected 1 entry, found {}",
            items.len()
        ))),
    }
}

fn decode_field<T>(
    item: &[UnaryToken],
    name: &str,
    decode: fn(&UnaryToken) -> Result<T, UtmError>,
) -> Result<T, UtmError> {
    match item {
        [token] => decode(token).map_err(|e| malformed(format!("{name}: {e}"))),
        tokens => Err(malformed(format!(
            "{name}: expected 1 token per entry, found {}",
            tokens.len()
        ))),
    }
}

fn decode_transition(item: &[UnaryToken]) -> Result<TransitionEntry, UtmError> {
    let [from, read, next, write, direction] = item else {
        return Err(malformed(format!(
            "transition with {} fields, expected {TRANSITION_FIELDS}",
            item.len()
        )));
    };
    let field = |e: UtmError| malformed(format!("transitions: {e}"));

    let key = (
        decode_state(from).map_err(field)?,
        decode_tape_symbol(read).map_err(field)?,
    );
    let action = Action {
        next: decode_state(next).map_err(field)?,
        write: decode_tape_symbol(write).map_err(field)?,
        direction: decode_direction(direction).map_err(field)?,
    };

    Ok((key, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn sample() -> MachineConfig {
        parse(
            r#"
name: Sample
states: q0, q1, q2
alphabet: 0, 1, B
blank: B
initial: q0
final: q2
rules:
  q0:
    0 -> 1, R, q1
    1 -> L, q0
  q1:
    B -> 0, R, q2
"#,
        )
        .unwrap()
        .config
    }

    fn bare() -> MachineConfig {
        parse(
            r#"
name: Bare
states: q0
alphabet: B
blank: B
initial: q0
final:
rules:
"#,
        )
        .unwrap()
        .config
    }

    #[test]
    fn test_encode_layout() {
        let encoded = encode_config(&bare());

        // states, alphabet, blank, initial, (no finals), (no transitions)
        assert_eq!(encoded, "000".to_owned() + "10" + "00" + "1110" + "00" + "1110" + "00" + "10" + "00" + "00" + "000");
    }

    #[test]
    fn test_encode_transition_fields() {
        let encoded = encode_config(&sample());

        // (q0, 0) -> (q1, 1, R)
        assert!(encoded.contains("1010110110110"));
        assert!(encoded.starts_with("000"));
        assert!(encoded.ends_with("000"));
    }

    #[test]
    fn test_round_trip() {
        for config in [sample(), bare()] {
            let encoded = encode_config(&config);
            assert_eq!(decode_config(&encoded).unwrap(), config);
        }
    }

    #[test]
    fn test_round_trip_many_states() {
        let mut text = String::from("name: Chain\nalphabet: 0, 1, B\nblank: B\ninitial: q0\nfinal: q9\nstates: ");
        text.push_str(&(0..10).map(|n| format!("q{n}")).collect::<Vec<_>>().join(", "));
        text.push_str("\nrules:\n");
        for n in 0..9 {
            text.push_str(&format!("  q{n}:\n    0 -> 1, R, q{}\n    B -> L, q{n}\n", n + 1));
        }

        let config = parse(&text).unwrap().config;
        assert_eq!(decode_config(&encode_config(&config)).unwrap(), config);
    }

    #[test]
    fn test_decode_missing_delimiters() {
        let encoded = encode_config(&sample());

        for broken in [
            encoded.trim_start_matches('0').to_string(),
            encoded[..encoded.len() - 2].to_string(),
            String::new(),
            "00000".to_string(),
        ] {
            assert!(matches!(
                decode_config(&broken),
                Err(UtmError::MalformedDescription(_))
            ));
        }
    }

    #[test]
    fn test_decode_requires_exact_brackets() {
        let encoded = encode_config(&sample());

        for broken in [
            format!("0{encoded}"),
            format!("00{encoded}"),
            format!("{encoded}0"),
        ] {
            assert!(matches!(
                decode_config(&broken),
                Err(UtmError::MalformedDescription(_))
            ));
        }
    }

    #[test]
    fn test_decode_wrong_counts() {
        // Only five sections.
        let five = "000".to_owned() + "10" + "00" + "1110" + "00" + "1110" + "00" + "10" + "00" + "000";
        let err = decode_config(&five).unwrap_err();
        assert!(err.to_string().contains("expected 6 sections, found 5"));

        // Two blank symbols.
        let two_blanks = "000".to_owned() + "10" + "00" + "1110" + "00" + "1110" + "0" + "1110" + "00" + "10" + "00" + "00" + "000";
        let err = decode_config(&two_blanks).unwrap_err();
        assert!(err.to_string().contains("blank: expected 1 entry"));

        // A transition with four fields.
        let short = "000".to_owned() + "10" + "00" + "1110" + "00" + "1110" + "00" + "10" + "00" + "00" + "10111010110" + "000";
        let err = decode_config(&short).unwrap_err();
        assert!(err.to_string().contains("4 fields"));
    }

    #[test]
    fn test_decode_bad_tokens() {
        // Alphabet entry with four marks is not a tape symbol.
        let bad_symbol = "000".to_owned() + "10" + "00" + "11110" + "00" + "1110" + "00" + "10" + "00" + "00" + "000";
        assert!(matches!(
            decode_config(&bad_symbol),
            Err(UtmError::MalformedDescription(msg)) if msg.contains("alphabet")
        ));

        assert!(matches!(
            decode_config("000102"),
            Err(UtmError::MalformedDescription(msg)) if msg.contains("unexpected character")
        ));
        assert!(matches!(
            decode_config("00011"),
            Err(UtmError::MalformedDescription(msg)) if msg.contains("unterminated")
        ));
    }

    #[test]
    fn test_decode_rejects_undeclared_states() {
        // Initial state q1 is not among the declared states.
        let encoded = "000".to_owned() + "10" + "00" + "1110" + "00" + "1110" + "00" + "110" + "00" + "00" + "000";
        assert!(matches!(
            decode_config(&encoded),
            Err(UtmError::MalformedDescription(msg)) if msg.contains("start state")
        ));
    }

    #[test]
    fn test_decode_transitions() {
        let config = sample();
        let mut encoded = String::new();
        for (&(state, symbol), action) in config.transitions() {
            if !encoded.is_empty() {
                encoded.push('0');
            }
            for token in encode_transition(state, symbol, action) {
                encoded.push_str(&token.to_string());
            }
        }

        let entries = decode_transitions(&encoded).unwrap();
        let expected: Vec<_> = config.transitions().iter().map(|(k, a)| (*k, *a)).collect();
        assert_eq!(entries, expected);

        assert!(decode_transitions("").unwrap().is_empty());
        assert!(decode_transitions(&format!("{encoded}00{encoded}")).is_err());
    }

    #[test]
    fn test_description_tape_lookup() {
        let config = sample();
        let description = DescriptionTape::from_config(&config).unwrap();

        assert_eq!(description.config(), &config);
        assert_eq!(description.tape().to_string(), encode_config(&config));

        for (&(state, symbol), action) in config.transitions() {
            let found = description.lookup(state, symbol).unwrap().unwrap();
            assert_eq!(decode_state(&found.next).unwrap(), action.next);
            assert_eq!(decode_tape_symbol(&found.write).unwrap(), action.write);
            assert_eq!(decode_direction(&found.direction).unwrap(), action.direction);
        }

        assert_eq!(description.lookup(StateId(1), TapeSymbol::One).unwrap(), None);
        assert_eq!(description.lookup(StateId(2), TapeSymbol::Blank).unwrap(), None);
    }

    #[test]
    fn test_description_tape_without_transitions() {
        let description = DescriptionTape::from_config(&bare()).unwrap();
        assert_eq!(description.lookup(StateId(0), TapeSymbol::Blank).unwrap(), None);
    }

    #[test]
    fn test_description_tape_rejects_malformed() {
        assert!(DescriptionTape::from_description("0001000").is_err());
    }
}
