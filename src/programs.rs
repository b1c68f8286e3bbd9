use crate::parser::parse;
use crate::types::{Program, StateId, UtmError};

// Default embedded programs
const PROGRAM_TEXTS: [&str; 5] = [
    include_str!("../programs/accept-one.utm"),
    include_str!("../programs/even-ones.utm"),
    include_str!("../programs/ends-with-zero.utm"),
    include_str!("../programs/invert-bits.utm"),
    include_str!("../programs/multiple-of-three.utm"),
];

lazy_static::lazy_static! {
    /// The embedded programs, parsed on first use.
    pub static ref PROGRAMS: Vec<Program> = PROGRAM_TEXTS
        .iter()
        .enumerate()
        .filter_map(|(index, text)| match parse(text) {
            Ok(program) => Some(program),
            Err(e) => {
                log::error!("Failed to parse embedded program {index}: {e}");
                None
            }
        })
        .collect();
}

pub struct ProgramManager;

impl ProgramManager {
    /// Get the number of available programs
    pub fn get_program_count() -> usize {
        PROGRAMS.len()
    }

    /// Get a program by its index
    pub fn get_program_by_index(index: usize) -> Result<Program, UtmError> {
        PROGRAMS
            .get(index)
            .cloned()
            .ok_or_else(|| UtmError::InvalidConfig(format!("Program index {index} out of range")))
    }

    /// Get a program by its name, ignoring case
    pub fn get_program_by_name(name: &str) -> Result<Program, UtmError> {
        PROGRAMS
            .iter()
            .find(|program| program.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| UtmError::InvalidConfig(format!("Program '{name}' not found")))
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        PROGRAMS.iter().map(|program| program.name.clone()).collect()
    }

    /// Get information about a program by its index
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, UtmError> {
        let program = Self::get_program_by_index(index)?;

        Ok(ProgramInfo {
            index,
            name: program.name.clone(),
            initial_state: program.config.initial(),
            initial_tape: program.default_input().to_string(),
            state_count: program.config.states().len(),
            final_count: program.config.finals().len(),
            transition_count: program.config.transitions().len(),
        })
    }

    /// Search for programs by name
    pub fn search_programs(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();

        PROGRAMS
            .iter()
            .enumerate()
            .filter(|(_, program)| program.name.to_lowercase().contains(&query))
            .map(|(index, _)| index)
            .collect()
    }

    /// Get the original text of a program by its index
    pub fn get_program_text_by_index(index: usize) -> Result<&'static str, UtmError> {
        PROGRAM_TEXTS.get(index).copied().ok_or_else(|| {
            UtmError::InvalidConfig(format!("Program text index {index} out of range"))
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub initial_state: StateId,
    pub initial_tape: String,
    pub state_count: usize,
    pub final_count: usize,
    pub transition_count: usize,
}
