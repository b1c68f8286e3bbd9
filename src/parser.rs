//! This module provides the parser for machine programs, utilizing the `pest` crate.
//! It defines the grammar for `.utm` files and functions to parse the input into a `Program`
//! struct, together with the single-literal parsers used for JSON records.

use crate::types::{
    Action, Direction, MachineConfig, Program, StateId, TapeSymbol, Transitions, UtmError,
    MAX_PROGRAM_SIZE,
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::{Pair, Pairs},
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

/// Derives a `PestParser` for the machine grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct UtmParser;

/// Parses the given input string into a `Program` struct.
///
/// This is the main entry point for parsing program definitions. The input is trimmed,
/// parsed with the `UtmParser` and the resulting parse tree is turned into a `Program`
/// whose configuration has already been validated.
///
/// # Arguments
///
/// * `input` - A string slice containing the program definition.
///
/// # Returns
///
/// * `Ok(Program)` if the input is successfully parsed and validated.
/// * `Err(UtmError::ParseError)` if there are any syntax errors.
/// * `Err(UtmError::InvalidConfig)` if a section is missing or the machine fails analysis.
pub fn parse(input: &str) -> Result<Program, UtmError> {
    if input.len() > MAX_PROGRAM_SIZE {
        return Err(UtmError::InvalidConfig(format!(
            "Program too large: {} bytes (maximum {})",
            input.len(),
            MAX_PROGRAM_SIZE
        )));
    }

    let mut pairs = UtmParser::parse(Rule::program, input.trim())
        .map_err(|e| UtmError::ParseError(Box::new(e)))?;
    let root = pairs
        .next()
        .ok_or_else(|| UtmError::InvalidConfig("Empty program".to_string()))?;

    parse_program(root)
}

/// Parses a state literal such as `q3`.
pub fn parse_state(input: &str) -> Result<StateId, UtmError> {
    let pair = parse_literal(Rule::state_literal, input)?;
    parse_value(&pair)
}

/// Parses a tape symbol literal: `0`, `1` or `B`.
pub fn parse_tape_symbol(input: &str) -> Result<TapeSymbol, UtmError> {
    let pair = parse_literal(Rule::symbol_literal, input)?;
    parse_value(&pair)
}

/// Parses a direction literal: `L` or `R`.
pub fn parse_direction(input: &str) -> Result<Direction, UtmError> {
    let pair = parse_literal(Rule::direction_literal, input)?;
    parse_value(&pair)
}

/// Parses a transition key of the form `qN,S`, as used by JSON records.
pub fn parse_transition_key(input: &str) -> Result<(StateId, TapeSymbol), UtmError> {
    let mut pairs = UtmParser::parse(Rule::transition_key, input.trim())
        .map_err(|e| UtmError::ParseError(Box::new(e)))?;
    let root = pairs
        .next()
        .ok_or_else(|| UtmError::UnrecognizedSymbol(input.to_string()))?;
    let span = root.as_span();
    let mut inner = root.into_inner();

    let state = parse_value(&next_pair(&mut inner, span)?)?;
    let symbol = parse_value(&next_pair(&mut inner, span)?)?;

    Ok((state, symbol))
}

/// Parses the top-level structure of a program from a `Pair<Rule::program>`.
///
/// Every section may appear at most once. `name`, `states`, `alphabet`, `blank`, `initial`
/// and `rules` are required; `finals` defaults to no final states, `tape` to no input and
/// `input_alphabet` to accepting every symbol of `alphabet` as input.
fn parse_program(pair: Pair<Rule>) -> Result<Program, UtmError> {
    let mut name: Option<String> = None;
    let mut states: Option<BTreeSet<StateId>> = None;
    let mut alphabet: Option<BTreeSet<TapeSymbol>> = None;
    let mut input_alphabet: Option<BTreeSet<TapeSymbol>> = None;
    let mut blank: Option<TapeSymbol> = None;
    let mut initial: Option<StateId> = None;
    let mut finals: Option<BTreeSet<StateId>> = None;
    let mut input: Option<String> = None;
    let mut rules: Option<Transitions> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(parse_inner_string(p)?.trim_end().to_string()),
            Rule::states => states = Some(parse_list(p, "state")?),
            Rule::alphabet => alphabet = Some(parse_list(p, "symbol")?),
            Rule::input_alphabet => input_alphabet = Some(parse_list(p, "input symbol")?),
            Rule::blank => blank = Some(parse_inner_value(p)?),
            Rule::initial => initial = Some(parse_inner_value(p)?),
            Rule::finals => finals = Some(parse_list(p, "final state")?),
            Rule::tape => input = Some(parse_inner_string(p)?),
            Rule::rules => rules = Some(parse_rules(p)?),
            _ => {} // EOI
        }
    }

    let name = check_required_rule(name, "name")?;
    let states = check_required_rule(states, "states")?;
    let alphabet = check_required_rule(alphabet, "alphabet")?;
    let blank = check_required_rule(blank, "blank")?;
    let initial = check_required_rule(initial, "initial")?;
    let rules = check_required_rule(rules, "rules")?;

    let mut config = MachineConfig::new(
        states,
        alphabet,
        blank,
        initial,
        finals.unwrap_or_default(),
        rules,
    )?;
    if let Some(symbols) = input_alphabet {
        config = config.with_input_alphabet(symbols)?;
    }

    Ok(Program {
        name,
        config,
        input,
    })
}

/// Parses a comma separated list section (`states`, `alphabet`, `input_alphabet` or `finals`).
///
/// Repeated entries are reported against the span of the offending item.
fn parse_list<T>(pair: Pair<Rule>, what: &str) -> Result<BTreeSet<T>, UtmError>
where
    T: Ord + FromStr<Err = UtmError>,
{
    let mut items = BTreeSet::new();

    // Rule: section > list > [item]
    for list in pair.into_inner() {
        for item in list.into_inner() {
            let value = parse_value(&item)?;
            if !items.insert(value) {
                return Err(parse_error(
                    &format!("Duplicate {what}: {}", item.as_str()),
                    item.as_span(),
                ));
            }
        }
    }

    Ok(items)
}

/// Parses the transition rules section from a `Pair<Rule::rules>`.
///
/// Each state may own at most one block, and each block at most one action per read symbol.
fn parse_rules(pair: Pair<Rule>) -> Result<Transitions, UtmError> {
    let mut transitions = Transitions::new();
    let mut blocks = HashSet::new();

    for block in pair.into_inner() {
        let span = block.as_span();
        let mut pairs = block.into_inner();
        let state_pair = next_pair(&mut pairs, span)?;
        let state: StateId = parse_value(&state_pair)?;

        if !blocks.insert(state) {
            return Err(parse_error(
                &format!("Duplicate transition rule: {state}"),
                span,
            ));
        }

        for action in pairs {
            let span = action.as_span();
            let (read, action) = parse_action(action)?;

            if transitions.insert((state, read), action).is_some() {
                return Err(parse_error(
                    &format!("Duplicate transition: ({state}, {read})"),
                    span,
                ));
            }
        }
    }

    Ok(transitions)
}

/// Parses a single action from a `Pair<Rule::action>`.
///
/// If the written symbol is omitted, the read symbol is written back.
fn parse_action(pair: Pair<Rule>) -> Result<(TapeSymbol, Action), UtmError> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let read: TapeSymbol = parse_value(&next_pair(&mut pairs, span)?)?;

    let write = match pairs.peek().map(|p| p.as_rule()) {
        Some(Rule::tape_symbol) => parse_value(&next_pair(&mut pairs, span)?)?,
        _ => read,
    };
    let direction = parse_value(&next_pair(&mut pairs, span)?)?;
    let next = parse_value(&next_pair(&mut pairs, span)?)?;

    Ok((
        read,
        Action {
            next,
            write,
            direction,
        },
    ))
}

fn parse_literal(rule: Rule, input: &str) -> Result<Pair<'_, Rule>, UtmError> {
    let mut pairs =
        UtmParser::parse(rule, input.trim()).map_err(|e| UtmError::ParseError(Box::new(e)))?;
    let root = pairs
        .next()
        .ok_or_else(|| UtmError::UnrecognizedSymbol(input.to_string()))?;
    let span = root.as_span();

    next_pair(&mut root.into_inner(), span)
}

/// Converts a terminal pair into its typed value.
fn parse_value<T: FromStr<Err = UtmError>>(pair: &Pair<Rule>) -> Result<T, UtmError> {
    pair.as_str()
        .parse()
        .map_err(|e: UtmError| parse_error(&e.to_string(), pair.as_span()))
}

/// Parses the single inner pair of a section into its typed value.
fn parse_inner_value<T: FromStr<Err = UtmError>>(pair: Pair<Rule>) -> Result<T, UtmError> {
    let span = pair.as_span();
    parse_value(&next_pair(&mut pair.into_inner(), span)?)
}

/// Extracts the inner string content from a `Pair`.
fn parse_inner_string(pair: Pair<Rule>) -> Result<String, UtmError> {
    let span = pair.as_span();
    Ok(next_pair(&mut pair.into_inner(), span)?.as_str().into())
}

fn next_pair<'a>(pairs: &mut Pairs<'a, Rule>, span: Span) -> Result<Pair<'a, Rule>, UtmError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("Unexpected end of section", span))
}

/// Creates a `UtmError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> UtmError {
    UtmError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Checks if a given rule has already been declared, ensuring uniqueness for top-level sections.
fn check_unique_rule(rule: Rule, span: Span, seen: &mut HashSet<Rule>) -> Result<(), UtmError> {
    if !matches!(
        rule,
        Rule::name
            | Rule::states
            | Rule::alphabet
            | Rule::input_alphabet
            | Rule::blank
            | Rule::initial
            | Rule::finals
            | Rule::tape
            | Rule::rules
    ) {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{rule:?}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required rule is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, UtmError> {
    value.ok_or_else(|| UtmError::InvalidConfig(format!("Missing '{name}' section")))
}
