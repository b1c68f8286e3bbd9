//! This module defines the `UniversalMachine` struct, which drives the transition engine
//! from an initial configuration to a verdict. It owns the work tape, decides when the
//! machine accepts or rejects and optionally keeps a history tape of applied transitions.

use crate::description::{decode_transitions, encode_transition, DescriptionTape, TransitionEntry};
use crate::engine::{Configuration, StepOutcome, TransitionEngine, TransitionSource, UnaryTable};
use crate::tape::Tape;
use crate::types::{
    Action, MachineConfig, Rejection, RunOutcome, StateId, Step, StepRecord, TapeSymbol,
    UtmError, Verdict, DEFAULT_PADDING,
};
use crate::unary::{decode_tape_symbol, encode_tape_symbol, UnaryToken};
use serde::{Deserialize, Serialize};

/// Where the machine looks up its transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Transitions are encoded once into a lookup table.
    #[default]
    Table,
    /// Transitions are found by scanning the machine's own encoded description.
    Universal,
}

/// Options controlling a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub mode: Mode,
    /// Maximum number of transitions before the run is stopped. `None` runs unbounded.
    pub step_limit: Option<usize>,
    /// Number of blank tokens added on each side of the tape whenever it is created or grown.
    pub padding: usize,
    /// Whether applied transitions are written to a history tape.
    pub record_history: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Table,
            step_limit: None,
            padding: DEFAULT_PADDING,
            record_history: false,
        }
    }
}

/// The execution status of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted(Verdict),
}

/// A universal machine running one input against one configuration.
///
/// The machine holds up to three tapes: the description tape inside the transition source
/// when running in [`Mode::Universal`], the work tape in its [`Configuration`] and an
/// optional history tape that only observers read.
#[derive(Debug, Clone)]
pub struct UniversalMachine {
    config: MachineConfig,
    engine: TransitionEngine,
    options: RunOptions,
    input: Result<Vec<UnaryToken>, char>,
    runtime: Configuration,
    history: Option<Tape>,
    status: Status,
    step_count: usize,
}

impl UniversalMachine {
    /// Creates a machine with default options.
    pub fn new(config: &MachineConfig, input: &str) -> Result<Self, UtmError> {
        Self::with_options(config, input, RunOptions::default())
    }

    /// Creates a machine for `config` and `input`.
    ///
    /// An input character that is not a symbol of the alphabet does not fail construction:
    /// the machine starts out halted with a [`Rejection::InvalidInputSymbol`] verdict.
    pub fn with_options(
        config: &MachineConfig,
        input: &str,
        options: RunOptions,
    ) -> Result<Self, UtmError> {
        let source = match options.mode {
            Mode::Table => TransitionSource::Table(UnaryTable::from_config(config)),
            Mode::Universal => TransitionSource::Description(DescriptionTape::from_config(config)?),
        };

        Ok(Self::assemble(config.clone(), source, input, options))
    }

    /// Creates a machine from a unary description rather than a parsed configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(UniversalMachine)` if the description decodes to a valid machine.
    /// * `Err(UtmError::MalformedDescription)` otherwise.
    pub fn from_description(
        description: &str,
        input: &str,
        options: RunOptions,
    ) -> Result<Self, UtmError> {
        let description = DescriptionTape::from_description(description)?;
        let config = description.config().clone();
        let source = match options.mode {
            Mode::Table => TransitionSource::Table(UnaryTable::from_config(&config)),
            Mode::Universal => TransitionSource::Description(description),
        };

        Ok(Self::assemble(config, source, input, options))
    }

    fn assemble(
        config: MachineConfig,
        source: TransitionSource,
        input: &str,
        options: RunOptions,
    ) -> Self {
        let input = encode_input(&config, input);
        let engine = TransitionEngine::new(source, config.alphabet().clone());
        let runtime = initial_configuration(&config, &input, options.padding);
        let history = initial_history(&config, &options);
        let status = initial_status(&config, &input);

        if let Status::Halted(verdict) = &status {
            log::debug!("Machine halted before its first step: {verdict}");
        }

        Self {
            config,
            engine,
            options,
            input,
            runtime,
            history,
            status,
            step_count: 0,
        }
    }

    /// Executes a single transition.
    ///
    /// # Returns
    ///
    /// * `Ok(Step::Continue)` with the applied transition.
    /// * `Ok(Step::Halt)` with the verdict once the machine has halted. Calling this again
    ///   after a halt returns the same verdict.
    /// * `Err(UtmError)` if the tape cannot grow or the transition source is corrupt.
    pub fn step_once(&mut self) -> Result<Step, UtmError> {
        if let Status::Halted(verdict) = &self.status {
            return Ok(Step::Halt(verdict.clone()));
        }

        if let Some(limit) = self.options.step_limit {
            if self.step_count >= limit {
                // The ceiling only counts when another transition would apply.
                let verdict = match self.engine.rejection(&mut self.runtime)? {
                    Some(rejection) => Verdict::Rejected(rejection),
                    None => Verdict::StepLimitExceeded(limit),
                };
                return Ok(self.halt(verdict));
            }
        }

        match self.engine.step(&mut self.runtime)? {
            StepOutcome::Continued(record) => {
                self.step_count += 1;
                self.record(&record)?;

                log::trace!("Step {}: {} head={}", self.step_count, record, record.head);

                // Reaching a final state ends the run, whatever transitions remain.
                if self.config.is_final(record.to) {
                    self.halt(Verdict::Accepted);
                }

                Ok(Step::Continue(record))
            }
            StepOutcome::Halted(rejection) => Ok(self.halt(Verdict::Rejected(rejection))),
        }
    }

    /// Runs the machine until it halts.
    pub fn run(&mut self) -> Result<RunOutcome, UtmError> {
        loop {
            if let Step::Halt(verdict) = self.step_once()? {
                return Ok(self.outcome(verdict));
            }
        }
    }

    /// Resets the machine to its initial configuration.
    ///
    /// This includes the state, the work tape, the head, the history and the step count.
    pub fn reset(&mut self) {
        self.runtime = initial_configuration(&self.config, &self.input, self.options.padding);
        self.history = initial_history(&self.config, &self.options);
        self.status = initial_status(&self.config, &self.input);
        self.step_count = 0;
    }

    /// Decodes the history tape into the transitions applied so far.
    ///
    /// Returns an empty list when history recording is disabled.
    pub fn history_records(&self) -> Result<Vec<TransitionEntry>, UtmError> {
        match &self.history {
            Some(tape) => decode_transitions(&tape.to_string()),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> StateId {
        self.runtime.state
    }

    /// Returns the head position as an index into the work tape.
    pub fn head(&self) -> usize {
        self.runtime.head
    }

    /// Returns the head position relative to where the input started.
    pub fn position(&self) -> isize {
        self.runtime.tape.position(self.runtime.head)
    }

    pub fn tape(&self) -> &Tape {
        &self.runtime.tape
    }

    pub fn history(&self) -> Option<&Tape> {
        self.history.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, Status::Halted(_))
    }

    /// Returns the total number of transitions applied.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Returns the symbol under the head, if the head sits on a valid token.
    pub fn symbol(&self) -> Option<TapeSymbol> {
        self.runtime
            .tape
            .read_token(self.runtime.head)
            .ok()
            .and_then(|(token, _)| decode_tape_symbol(&token).ok())
    }

    fn halt(&mut self, verdict: Verdict) -> Step {
        log::debug!(
            "Machine halted in {} after {} steps: {}",
            self.runtime.state,
            self.step_count,
            verdict
        );

        self.status = Status::Halted(verdict.clone());
        Step::Halt(verdict)
    }

    fn record(&mut self, record: &StepRecord) -> Result<(), UtmError> {
        let Some(history) = self.history.as_mut() else {
            return Ok(());
        };

        let action = Action {
            next: record.to,
            write: record.write,
            direction: record.direction,
        };
        if !history.is_empty() {
            history.append_gap(1)?;
        }
        for token in encode_transition(record.from, record.read, &action) {
            history.append(&token)?;
        }

        Ok(())
    }

    fn outcome(&self, verdict: Verdict) -> RunOutcome {
        RunOutcome {
            verdict,
            state: self.runtime.state,
            tape: self.runtime.tape.contents(),
            head: self.runtime.head,
            position: self.position(),
            steps: self.step_count,
        }
    }
}

/// Runs `input` against `config` with default options.
pub fn run(config: &MachineConfig, input: &str) -> Result<RunOutcome, UtmError> {
    UniversalMachine::new(config, input)?.run()
}

/// Encodes every input character, or returns the first one the machine does not accept
/// as input.
fn encode_input(config: &MachineConfig, input: &str) -> Result<Vec<UnaryToken>, char> {
    input
        .chars()
        .map(|c| {
            TapeSymbol::from_char(c)
                .filter(|&symbol| config.accepts_input(symbol))
                .map(encode_tape_symbol)
                .ok_or(c)
        })
        .collect()
}

fn initial_configuration(
    config: &MachineConfig,
    input: &Result<Vec<UnaryToken>, char>,
    padding: usize,
) -> Configuration {
    let blank = encode_tape_symbol(config.blank());
    let tokens = input.as_deref().unwrap_or_default();

    Configuration::new(config.initial(), Tape::with_input(blank, padding, tokens))
}

fn initial_history(config: &MachineConfig, options: &RunOptions) -> Option<Tape> {
    options
        .record_history
        .then(|| Tape::empty(encode_tape_symbol(config.blank())))
}

fn initial_status(config: &MachineConfig, input: &Result<Vec<UnaryToken>, char>) -> Status {
    match input {
        Err(c) => Status::Halted(Verdict::Rejected(Rejection::InvalidInputSymbol(*c))),
        Ok(_) if config.is_final(config.initial()) => Status::Halted(Verdict::Accepted),
        Ok(_) => Status::Running,
    }
}
