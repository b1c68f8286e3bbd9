use clap::Parser;
use std::error::Error;
use std::io::{self, Read};
use std::path::Path;
use utm::description::encode_config;
use utm::{
    Mode, Program, ProgramLoader, ProgramManager, RunOptions, Step, UniversalMachine, UtmError,
};

/// Runs machines on a universal Turing machine over a unary code.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  utm-cli --builtin 'Even Ones' --input 1010
  utm-cli --program machine.json --universal --trace
  echo 0110 | utm-cli --program ends-with-zero.utm")]
struct Cli {
    /// Path to a machine program file (.utm or .json).
    #[clap(short, long, conflicts_with_all = ["builtin", "description"])]
    program: Option<String>,

    /// Name of a built-in program (see --list).
    #[clap(short, long, conflicts_with = "description")]
    builtin: Option<String>,

    /// A unary machine description, as printed by --encode.
    #[clap(long)]
    description: Option<String>,

    /// The input word. Defaults to stdin when piped, then to the program's own input.
    #[clap(short, long)]
    input: Option<String>,

    /// Look transitions up on the encoded description instead of a table.
    #[clap(short, long)]
    universal: bool,

    /// Stop after this many transitions.
    #[clap(short, long)]
    max_steps: Option<usize>,

    /// Print each step of the execution.
    #[clap(short = 'd', long)]
    trace: bool,

    /// Print the applied transitions once the machine halts.
    #[clap(long)]
    history: bool,

    /// Print the unary description of the program and exit.
    #[clap(short, long, conflicts_with = "description")]
    encode: bool,

    /// List the built-in programs and exit.
    #[clap(short, long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.list {
        for index in 0..ProgramManager::get_program_count() {
            let info = ProgramManager::get_program_info(index)?;
            println!(
                "{}. {} ({} states, {} transitions, input: {})",
                info.index, info.name, info.state_count, info.transition_count, info.initial_tape
            );
        }
        return Ok(());
    }

    let options = RunOptions {
        mode: if cli.universal {
            Mode::Universal
        } else {
            Mode::Table
        },
        step_limit: cli.max_steps,
        record_history: cli.history,
        ..RunOptions::default()
    };

    let mut machine = match &cli.description {
        Some(description) => {
            let input = read_input(&cli, "")?;
            UniversalMachine::from_description(description, &input, options)?
        }
        None => {
            let program = load_program(&cli)?;

            if cli.encode {
                println!("{}", encode_config(&program.config));
                return Ok(());
            }

            println!("Program: {}", program.name);
            let input = read_input(&cli, program.default_input())?;
            UniversalMachine::with_options(&program.config, &input, options)?
        }
    };

    print_configuration("Initial", &machine);

    if cli.trace {
        while let Step::Continue(record) = machine.step_once()? {
            println!(
                "Step {}: {} | State: {} | Head Position: {}",
                machine.step_count(),
                record,
                machine.state(),
                machine.position()
            );
        }
    }

    let outcome = machine.run()?;

    print_configuration("Final", &machine);
    println!("Steps: {}", outcome.steps);

    if cli.history {
        println!("History:");
        for ((from, read), action) in machine.history_records()? {
            println!(
                "  ({from}, {read}) -> ({}, {}, {})",
                action.next, action.write, action.direction
            );
        }
    }

    if outcome.verdict.is_accepted() {
        println!("Input accepted");
        Ok(())
    } else {
        println!("Input {}", outcome.verdict);
        std::process::exit(1);
    }
}

/// Loads the program named on the command line, from a file or from the built-ins.
fn load_program(cli: &Cli) -> Result<Program, UtmError> {
    match (&cli.program, &cli.builtin) {
        (Some(path), _) => ProgramLoader::load_program(Path::new(path)),
        (None, Some(name)) => ProgramManager::get_program_by_name(name),
        (None, None) => Err(UtmError::InvalidConfig(
            "No program given: use --program, --builtin or --description".to_string(),
        )),
    }
}

/// Picks the input word: the flag first, then piped stdin, then `default`.
fn read_input(cli: &Cli, default: &str) -> Result<String, io::Error> {
    if let Some(input) = &cli.input {
        return Ok(input.trim().to_string());
    }

    if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer.trim().to_string());
    }

    Ok(default.to_string())
}

fn print_configuration(label: &str, machine: &UniversalMachine) {
    println!("{label} State: {}", machine.state());
    println!("{label} Tape: {}", machine.tape().contents());
    println!("{label} Head Position: {}", machine.position());
}
