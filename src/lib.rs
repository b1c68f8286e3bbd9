//! This crate provides the core of a universal Turing machine over a self-delimiting unary code.
//! It includes modules for encoding symbols and whole machines in unary, parsing and analyzing
//! machine programs, stepping transitions on a growable tape and driving a run to a verdict.

pub mod analyzer;
pub mod description;
pub mod engine;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod tape;
pub mod types;
pub mod unary;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports the machine description codec.
pub use description::{decode_config, encode_config, DescriptionTape};
/// Re-exports the transition engine and its runtime configuration.
pub use engine::{Configuration, StepOutcome, TransitionEngine, TransitionSource};
/// Re-exports the `ProgramLoader` struct and the JSON record layouts from the loader module.
pub use loader::{ConfigRecord, ProgramLoader, TupleRecord};
/// Re-exports the execution controller.
pub use machine::{run, Mode, RunOptions, Status, UniversalMachine};
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
/// Re-exports `ProgramInfo`, `ProgramManager`, and `PROGRAMS` from the programs module.
pub use programs::{ProgramInfo, ProgramManager, PROGRAMS};
pub use tape::Tape;
/// Re-exports the types shared by every module.
pub use types::{
    Action, Direction, MachineConfig, Program, Rejection, RunOutcome, StateId, Step, StepRecord,
    Symbol, SymbolClass, TapeSymbol, UtmError, Verdict, MAX_PROGRAM_SIZE,
};
/// Re-exports the unary codec.
pub use unary::{decode, decode_untyped, encode, UnaryToken};
