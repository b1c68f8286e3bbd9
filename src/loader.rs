//! This module provides the `ProgramLoader` struct, responsible for loading machine programs
//! from files and strings, either in the `.utm` text format or as JSON records.
//!
//! Two JSON layouts are understood: the keyed [`ConfigRecord`] and the [`TupleRecord`], told
//! apart by the presence of a `transicoes` list.

use crate::parser::{parse, parse_direction, parse_state, parse_tape_symbol, parse_transition_key};
use crate::types::{
    Action, Direction, MachineConfig, Program, StateId, TapeSymbol, Transitions, UtmError,
    MAX_PROGRAM_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Name given to JSON programs that do not carry one.
const UNTITLED: &str = "Untitled";

/// A machine configuration as stored in a JSON file.
///
/// Transitions are keyed by `"qN,S"` and map to `[next state, write symbol, direction]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub states: Vec<String>,
    pub alphabet: Vec<String>,
    /// Symbols an input word may contain; every alphabet symbol when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_alphabet: Option<Vec<String>>,
    pub blank_symbol: String,
    pub initial_state: String,
    #[serde(default)]
    pub final_states: Vec<String>,
    pub transitions: BTreeMap<String, [String; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl ConfigRecord {
    /// Builds the record describing `program`.
    pub fn from_program(program: &Program) -> Self {
        let config = &program.config;

        Self {
            name: Some(program.name.clone()),
            states: to_strings(config.states()),
            alphabet: to_strings(config.alphabet()),
            input_alphabet: config.input_alphabet().map(to_strings),
            blank_symbol: config.blank().to_string(),
            initial_state: config.initial().to_string(),
            final_states: to_strings(config.finals()),
            transitions: config
                .transitions()
                .iter()
                .map(|((state, symbol), action)| {
                    (
                        format!("{state},{symbol}"),
                        [
                            action.next.to_string(),
                            action.write.to_string(),
                            action.direction.to_string(),
                        ],
                    )
                })
                .collect(),
            input: program.input.clone(),
        }
    }

    /// Converts the record into a validated program.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if every literal parses and the machine passes analysis.
    /// * `Err(UtmError::ParseError)` if a literal is not a state, symbol or direction.
    /// * `Err(UtmError::InvalidConfig)` for repeated entries or a failed analysis.
    pub fn into_program(self) -> Result<Program, UtmError> {
        let states = collect_unique(&self.states, "state", parse_state)?;
        let alphabet = collect_unique(&self.alphabet, "symbol", parse_tape_symbol)?;
        let finals = collect_unique(&self.final_states, "final state", parse_state)?;
        let blank = parse_tape_symbol(&self.blank_symbol)?;
        let initial = parse_state(&self.initial_state)?;

        let mut transitions = Transitions::new();
        for (key, [next, write, direction]) in &self.transitions {
            let key = parse_transition_key(key)?;
            let action = Action {
                next: parse_state(next)?,
                write: parse_tape_symbol(write)?,
                direction: parse_direction(direction)?,
            };

            // Keys such as "q0,1" and "q0, 1" are distinct JSON keys but the same transition.
            insert_transition(&mut transitions, key, action)?;
        }

        let mut config = MachineConfig::new(states, alphabet, blank, initial, finals, transitions)?;
        if let Some(symbols) = &self.input_alphabet {
            config = config.with_input_alphabet(collect_unique(
                symbols,
                "input symbol",
                parse_tape_symbol,
            )?)?;
        }

        Ok(Program {
            name: self.name.unwrap_or_else(|| UNTITLED.to_string()),
            config,
            input: self.input,
        })
    }
}

/// A machine configuration listing its transitions as `[from, read, to, write, direction]`.
///
/// The input alphabet is kept apart from the tape alphabet, directions may also be written
/// `D` (right) and `E` (left), and the blank is always `B`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleRecord {
    #[serde(rename = "estados")]
    pub states: Vec<String>,
    #[serde(rename = "alfabetoEntrada")]
    pub input_alphabet: Vec<String>,
    #[serde(rename = "alfabetoFita")]
    pub tape_alphabet: Vec<String>,
    #[serde(rename = "transicoes")]
    pub transitions: Vec<[String; 5]>,
    #[serde(rename = "estadoInicial")]
    pub initial_state: String,
    #[serde(rename = "estadoFinal", default)]
    pub final_states: Vec<String>,
}

impl TupleRecord {
    /// Converts the record into a validated program named `name`, or `Untitled`.
    pub fn into_program(self, name: Option<String>) -> Result<Program, UtmError> {
        let states = collect_unique(&self.states, "state", parse_state)?;
        let alphabet = collect_unique(&self.tape_alphabet, "symbol", parse_tape_symbol)?;
        let input_alphabet =
            collect_unique(&self.input_alphabet, "input symbol", parse_tape_symbol)?;
        let finals = collect_unique(&self.final_states, "final state", parse_state)?;
        let initial = parse_state(&self.initial_state)?;

        let mut transitions = Transitions::new();
        for [from, read, next, write, direction] in &self.transitions {
            let key: (StateId, TapeSymbol) = (parse_state(from)?, parse_tape_symbol(read)?);
            let action = Action {
                next: parse_state(next)?,
                write: parse_tape_symbol(write)?,
                direction: parse_tuple_direction(direction)?,
            };

            insert_transition(&mut transitions, key, action)?;
        }

        let config =
            MachineConfig::new(states, alphabet, TapeSymbol::Blank, initial, finals, transitions)?
                .with_input_alphabet(input_alphabet)?;

        Ok(Program {
            name: name.unwrap_or_else(|| UNTITLED.to_string()),
            config,
            input: None,
        })
    }
}

/// `ProgramLoader` is a utility struct for loading machine programs.
/// It provides methods to load programs from individual files, from string content,
/// and to discover and load all `.utm` and `.json` files within a specified directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads a single program from the specified file path.
    ///
    /// Files with a `.json` extension are read as [`ConfigRecord`]s or [`TupleRecord`]s,
    /// everything else as `.utm` text. A JSON record without a name is named after the file.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if the file is successfully read and parsed into a `Program`.
    /// * `Err(UtmError::FileError)` if the file cannot be read or is too large.
    /// * `Err(UtmError::ParseError)` if the file content is not a valid program.
    pub fn load_program(path: &Path) -> Result<Program, UtmError> {
        let content = fs::read_to_string(path).map_err(|e| {
            UtmError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        if content.len() > MAX_PROGRAM_SIZE {
            return Err(UtmError::FileError(format!(
                "File {} exceeds {} bytes",
                path.display(),
                MAX_PROGRAM_SIZE
            )));
        }

        log::debug!("Loading program from {}", path.display());

        if path.extension().is_some_and(|ext| ext == "json") {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
            Self::json_program(&content, stem)
        } else {
            parse(&content)
        }
    }

    /// Loads a single program from `.utm` text.
    pub fn load_program_from_string(content: &str) -> Result<Program, UtmError> {
        parse(content)
    }

    /// Loads a single program from a JSON record of either layout.
    pub fn load_json_from_string(content: &str) -> Result<Program, UtmError> {
        Self::json_program(content, None)
    }

    /// Serializes `program` as a pretty-printed JSON record.
    pub fn to_json(program: &Program) -> Result<String, UtmError> {
        serde_json::to_string_pretty(&ConfigRecord::from_program(program))
            .map_err(|e| UtmError::FileError(format!("Failed to serialize program: {e}")))
    }

    /// Loads all program files (`.utm` and `.json`) from a given directory.
    ///
    /// Directories and files with other extensions are skipped.
    ///
    /// # Returns
    ///
    /// * `Vec<Result<(PathBuf, Program), UtmError>>` - one entry per candidate file, holding
    ///   either its path and program or the error that prevented loading it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), UtmError>> {
        if !directory.exists() {
            return vec![Err(UtmError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(UtmError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut results: Vec<_> = entries
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Some(Err(UtmError::FileError(format!(
                            "Failed to read directory entry: {}",
                            e
                        ))))
                    }
                };

                let path = entry.path();

                // Skip directories and unknown extensions
                if path.is_dir()
                    || path
                        .extension()
                        .is_none_or(|ext| ext != "utm" && ext != "json")
                {
                    return None;
                }

                match Self::load_program(&path) {
                    Ok(program) => Some(Ok((path, program))),
                    Err(e) => Some(Err(UtmError::FileError(format!(
                        "Failed to load program from {}: {}",
                        path.display(),
                        e
                    )))),
                }
            })
            .collect();

        results.sort_by_key(|result| result.as_ref().ok().map(|(path, _)| path.clone()));
        results
    }

    fn json_program(content: &str, default_name: Option<String>) -> Result<Program, UtmError> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(invalid_json)?;

        if value.get("transicoes").is_some() {
            let record: TupleRecord = serde_json::from_value(value).map_err(invalid_json)?;
            return record.into_program(default_name);
        }

        let mut record: ConfigRecord = serde_json::from_value(value).map_err(invalid_json)?;
        if record.name.is_none() {
            record.name = default_name;
        }
        record.into_program()
    }
}

fn invalid_json(e: serde_json::Error) -> UtmError {
    UtmError::FileError(format!("Invalid JSON record: {e}"))
}

/// Parses a direction literal, accepting `D` and `E` besides `R` and `L`.
fn parse_tuple_direction(literal: &str) -> Result<Direction, UtmError> {
    match literal.trim() {
        "D" => Ok(Direction::Right),
        "E" => Ok(Direction::Left),
        other => parse_direction(other),
    }
}

fn insert_transition(
    transitions: &mut Transitions,
    key: (StateId, TapeSymbol),
    action: Action,
) -> Result<(), UtmError> {
    if transitions.insert(key, action).is_some() {
        return Err(UtmError::InvalidConfig(format!(
            "Duplicate transition: ({}, {})",
            key.0, key.1
        )));
    }

    Ok(())
}

fn to_strings<T: ToString>(items: &BTreeSet<T>) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn collect_unique<T, F>(items: &[String], what: &str, parse: F) -> Result<BTreeSet<T>, UtmError>
where
    T: Ord,
    F: Fn(&str) -> Result<T, UtmError>,
{
    let mut set = BTreeSet::new();

    for item in items {
        if !set.insert(parse(item)?) {
            return Err(UtmError::InvalidConfig(format!("Duplicate {what}: {item}")));
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::run;
    use crate::types::{Rejection, Verdict};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const PROGRAM: &str =
        "name: Test Program\nstates: q0, q1\nalphabet: 0, 1, B\nblank: B\ninitial: q0\nfinal: q1\ntape: 1\nrules:\n  q0:\n    1 -> R, q1";

    const RECORD: &str = r#"{
  "states": ["q0", "q1", "q2"],
  "alphabet": ["0", "1", "B"],
  "blank_symbol": "B",
  "initial_state": "q0",
  "final_states": ["q2"],
  "transitions": {
    "q0,0": ["q1", "1", "R"],
    "q1,B": ["q2", "B", "L"]
  },
  "input": "0"
}"#;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_program() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "test.utm", PROGRAM);

        let program = ProgramLoader::load_program(&file_path).unwrap();

        assert_eq!(program.name, "Test Program");
        assert_eq!(program.default_input(), "1");
        assert_eq!(program.config.transitions().len(), 1);
    }

    #[test]
    fn test_load_invalid_program() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "invalid.utm", "This is not a valid program");

        assert!(ProgramLoader::load_program(&file_path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ProgramLoader::load_program(&dir.path().join("missing.utm"));

        assert!(matches!(result, Err(UtmError::FileError(msg)) if msg.contains("missing.utm")));
    }

    #[test]
    fn test_load_json_record() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "flip.json", RECORD);

        let program = ProgramLoader::load_program(&file_path).unwrap();

        assert_eq!(program.name, "flip");
        assert_eq!(program.input.as_deref(), Some("0"));
        assert_eq!(program.config.initial(), StateId(0));
        assert_eq!(
            program.config.action(StateId(1), TapeSymbol::Blank),
            Some(&Action {
                next: StateId(2),
                write: TapeSymbol::Blank,
                direction: Direction::Left,
            })
        );
    }

    const TUPLE_RECORD: &str = r#"{
  "estados": ["q0", "q1", "q2"],
  "alfabetoEntrada": ["0", "1"],
  "alfabetoFita": ["0", "1", "B"],
  "transicoes": [
    ["q0", "0", "q0", "0", "D"],
    ["q0", "1", "q1", "1", "D"],
    ["q1", "B", "q2", "B", "E"]
  ],
  "estadoInicial": "q0",
  "estadoFinal": ["q2"]
}"#;

    #[test]
    fn test_load_tuple_record() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "ends-with-one.json", TUPLE_RECORD);

        let program = ProgramLoader::load_program(&file_path).unwrap();

        assert_eq!(program.name, "ends-with-one");
        assert_eq!(program.input, None);
        assert_eq!(program.config.blank(), TapeSymbol::Blank);
        assert_eq!(
            program.config.input_alphabet(),
            Some(&BTreeSet::from([TapeSymbol::Zero, TapeSymbol::One]))
        );
        assert_eq!(
            program.config.action(StateId(0), TapeSymbol::One),
            Some(&Action {
                next: StateId(1),
                write: TapeSymbol::One,
                direction: Direction::Right,
            })
        );
        assert_eq!(
            program.config.action(StateId(1), TapeSymbol::Blank).map(|a| a.direction),
            Some(Direction::Left)
        );
    }

    #[test]
    fn test_tuple_record_input_alphabet_refuses_blank() {
        let program = ProgramLoader::load_json_from_string(TUPLE_RECORD).unwrap();

        let outcome = run(&program.config, "001").unwrap();
        assert!(outcome.verdict.is_accepted());

        let outcome = run(&program.config, "0B1").unwrap();
        assert_eq!(
            outcome.verdict,
            Verdict::Rejected(Rejection::InvalidInputSymbol('B'))
        );
        assert_eq!(outcome.steps, 0);
    }

    #[test]
    fn test_tuple_record_errors() {
        // An input symbol the tape cannot hold.
        let undeclared = TUPLE_RECORD.replace(
            r#""alfabetoFita": ["0", "1", "B"]"#,
            r#""alfabetoFita": ["1", "B"]"#,
        );
        assert!(matches!(
            ProgramLoader::load_json_from_string(&undeclared),
            Err(UtmError::InvalidConfig(_))
        ));

        // Two tuples for the same state and symbol.
        let duplicate = TUPLE_RECORD.replace(
            r#"["q1", "B", "q2", "B", "E"]"#,
            r#"["q1", "B", "q2", "B", "E"], ["q1", "B", "q0", "B", "D"]"#,
        );
        assert!(matches!(
            ProgramLoader::load_json_from_string(&duplicate),
            Err(UtmError::InvalidConfig(msg)) if msg.contains("Duplicate transition")
        ));

        // A tuple with four elements.
        let short = TUPLE_RECORD.replace(
            r#"["q0", "0", "q0", "0", "D"]"#,
            r#"["q0", "0", "q0", "D"]"#,
        );
        assert!(matches!(
            ProgramLoader::load_json_from_string(&short),
            Err(UtmError::FileError(_))
        ));
    }

    #[test]
    fn test_json_input_alphabet_round_trip() {
        let with_input_alphabet = RECORD.replace(
            r#""blank_symbol": "B","#,
            r#""input_alphabet": ["0", "1"], "blank_symbol": "B","#,
        );
        let program = ProgramLoader::load_json_from_string(&with_input_alphabet).unwrap();
        assert!(!program.config.accepts_input(TapeSymbol::Blank));

        let json = ProgramLoader::to_json(&program).unwrap();
        assert!(json.contains("input_alphabet"));
        assert_eq!(ProgramLoader::load_json_from_string(&json).unwrap(), program);
    }

    #[test]
    fn test_json_without_name() {
        let program = ProgramLoader::load_json_from_string(RECORD).unwrap();
        assert_eq!(program.name, UNTITLED);
    }

    #[test]
    fn test_json_record_errors() {
        // Not JSON at all.
        assert!(matches!(
            ProgramLoader::load_json_from_string("states: q0"),
            Err(UtmError::FileError(_))
        ));

        // A direction the machine does not support.
        let bad_direction = RECORD.replace(r#""q1", "1", "R""#, r#""q1", "1", "S""#);
        assert!(matches!(
            ProgramLoader::load_json_from_string(&bad_direction),
            Err(UtmError::ParseError(_))
        ));

        // An undeclared target state.
        let undeclared = RECORD.replace(r#""q2", "B", "L""#, r#""q7", "B", "L""#);
        assert!(matches!(
            ProgramLoader::load_json_from_string(&undeclared),
            Err(UtmError::InvalidConfig(msg)) if msg.contains("q7")
        ));

        // The same transition under two spellings of its key.
        let duplicate = RECORD.replace(
            r#""q1,B": ["q2", "B", "L"]"#,
            r#""q1,B": ["q2", "B", "L"], "q1, B": ["q2", "B", "R"]"#,
        );
        assert!(matches!(
            ProgramLoader::load_json_from_string(&duplicate),
            Err(UtmError::InvalidConfig(msg)) if msg.contains("Duplicate transition")
        ));
    }

    #[test]
    fn test_json_export_round_trip() {
        let program = ProgramLoader::load_program_from_string(PROGRAM).unwrap();

        let json = ProgramLoader::to_json(&program).unwrap();
        let back = ProgramLoader::load_json_from_string(&json).unwrap();

        assert_eq!(back, program);
        assert!(json.contains(r#""q0,1""#));
    }

    #[test]
    fn test_load_programs_from_directory() {
        let dir = tempdir().unwrap();

        write_file(dir.path(), "valid.utm", PROGRAM);
        write_file(dir.path(), "record.json", RECORD);
        write_file(dir.path(), "invalid.utm", "This is not a valid program");
        // A file with another extension that should be ignored
        write_file(dir.path(), "ignored.txt", "This file should be ignored");

        let results = ProgramLoader::load_programs(dir.path());

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn test_load_programs_missing_directory() {
        let dir = tempdir().unwrap();
        let results = ProgramLoader::load_programs(&dir.path().join("nowhere"));

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
