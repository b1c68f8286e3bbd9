//! This module provides functions for analyzing machine configurations to detect errors
//! and inconsistencies before execution. This includes checks for declared start and final
//! states, transition endpoints and the symbols transitions read and write.

use crate::types::{MachineConfig, StateId, TapeSymbol, UtmError};
use std::collections::{BTreeSet, VecDeque};

/// Represents various errors that can be found during the analysis of a machine configuration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// No states are declared at all.
    NoStates,
    /// The initial state is not one of the declared states.
    InvalidStartState(StateId),
    /// Final states that are not among the declared states.
    UndeclaredFinalStates(Vec<StateId>),
    /// The blank symbol is not part of the alphabet.
    BlankNotInAlphabet(TapeSymbol),
    /// Transitions start from or lead to states that are not declared.
    UndefinedStates(Vec<StateId>),
    /// Transitions read or write symbols outside the alphabet.
    UndefinedSymbols(Vec<TapeSymbol>),
    /// Input alphabet symbols that are not part of the tape alphabet.
    UndefinedInputSymbols(Vec<TapeSymbol>),
}

impl From<AnalysisError> for UtmError {
    /// Converts an `AnalysisError` into a `UtmError::InvalidConfig`.
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::NoStates => UtmError::InvalidConfig("No states declared".to_string()),
            AnalysisError::InvalidStartState(state) => {
                UtmError::InvalidConfig(format!("Invalid start state: {}", state))
            }
            AnalysisError::UndeclaredFinalStates(states) => UtmError::InvalidConfig(format!(
                "Final states are not declared: {}",
                join(&states)
            )),
            AnalysisError::BlankNotInAlphabet(symbol) => UtmError::InvalidConfig(format!(
                "Blank symbol {} is not part of the alphabet",
                symbol
            )),
            AnalysisError::UndefinedStates(states) => UtmError::InvalidConfig(format!(
                "Transitions reference undeclared states: {}",
                join(&states)
            )),
            AnalysisError::UndefinedSymbols(symbols) => UtmError::InvalidConfig(format!(
                "Transitions reference symbols outside the alphabet: {}",
                join(&symbols)
            )),
            AnalysisError::UndefinedInputSymbols(symbols) => UtmError::InvalidConfig(format!(
                "Input alphabet symbols are not part of the alphabet: {}",
                join(&symbols)
            )),
        }
    }
}

/// Analyzes a machine configuration for structural and logical errors.
///
/// # Arguments
///
/// * `config` - A reference to the `MachineConfig` to be analyzed.
///
/// # Returns
///
/// * `Ok(())` if no errors are found.
/// * `Err(UtmError::InvalidConfig)` describing the first violated rule.
pub fn analyze(config: &MachineConfig) -> Result<(), UtmError> {
    let errors = [
        check_states,
        check_valid_start_state,
        check_final_states,
        check_blank,
        check_transition_states,
        check_transition_symbols,
        check_input_alphabet,
    ]
    .iter()
    .filter_map(|f| f(config).err())
    .collect::<Vec<_>>();

    if let Some(first_error) = errors.into_iter().next() {
        return Err(first_error.into());
    }

    let unreachable = unreachable_states(config);
    if !unreachable.is_empty() {
        log::warn!("Unreachable states: {}", join(&unreachable));
    }

    Ok(())
}

/// Returns the declared states that no sequence of transitions can reach from the initial state.
pub fn unreachable_states(config: &MachineConfig) -> Vec<StateId> {
    let mut reachable = BTreeSet::from([config.initial()]);
    let mut queue = VecDeque::from([config.initial()]);

    while let Some(state) = queue.pop_front() {
        for (_, action) in config
            .transitions()
            .range((state, TapeSymbol::Zero)..=(state, TapeSymbol::Blank))
        {
            if reachable.insert(action.next) {
                queue.push_back(action.next);
            }
        }
    }

    config
        .states()
        .iter()
        .filter(|state| !reachable.contains(state))
        .copied()
        .collect()
}

fn check_states(config: &MachineConfig) -> Result<(), AnalysisError> {
    if config.states().is_empty() {
        return Err(AnalysisError::NoStates);
    }

    Ok(())
}

/// Checks that the initial state is declared.
fn check_valid_start_state(config: &MachineConfig) -> Result<(), AnalysisError> {
    if !config.states().contains(&config.initial()) {
        return Err(AnalysisError::InvalidStartState(config.initial()));
    }

    Ok(())
}

/// Checks that every final state is declared.
fn check_final_states(config: &MachineConfig) -> Result<(), AnalysisError> {
    let undeclared: Vec<_> = config.finals().difference(config.states()).copied().collect();

    if !undeclared.is_empty() {
        return Err(AnalysisError::UndeclaredFinalStates(undeclared));
    }

    Ok(())
}

fn check_blank(config: &MachineConfig) -> Result<(), AnalysisError> {
    if !config.alphabet().contains(&config.blank()) {
        return Err(AnalysisError::BlankNotInAlphabet(config.blank()));
    }

    Ok(())
}

/// Checks that both endpoints of every transition are declared states.
fn check_transition_states(config: &MachineConfig) -> Result<(), AnalysisError> {
    let undefined: BTreeSet<_> = config
        .transitions()
        .iter()
        .flat_map(|(&(from, _), action)| [from, action.next])
        .filter(|state| !config.states().contains(state))
        .collect();

    if !undefined.is_empty() {
        return Err(AnalysisError::UndefinedStates(undefined.into_iter().collect()));
    }

    Ok(())
}

/// Checks that every symbol read or written by a transition belongs to the alphabet.
fn check_transition_symbols(config: &MachineConfig) -> Result<(), AnalysisError> {
    let undefined: BTreeSet<_> = config
        .transitions()
        .iter()
        .flat_map(|(&(_, read), action)| [read, action.write])
        .filter(|symbol| !config.alphabet().contains(symbol))
        .collect();

    if !undefined.is_empty() {
        return Err(AnalysisError::UndefinedSymbols(undefined.into_iter().collect()));
    }

    Ok(())
}

fn check_input_alphabet(config: &MachineConfig) -> Result<(), AnalysisError> {
    let Some(input_alphabet) = config.input_alphabet() else {
        return Ok(());
    };

    let undefined: Vec<_> = input_alphabet.difference(config.alphabet()).copied().collect();

    if !undefined.is_empty() {
        return Err(AnalysisError::UndefinedInputSymbols(undefined));
    }

    Ok(())
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
