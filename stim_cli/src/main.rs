use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use stim_core::*;

#[derive(Parser)]
#[command(name = "stimctl")]
#[command(about = "Stimulation protocol composer and validator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a protocol file and summarize the command
    Check {
        /// Protocol file (.toml or .json)
        file: PathBuf,
    },

    /// Print the function sequence produced by a traversal
    Expand {
        /// Protocol file (.toml or .json)
        file: PathBuf,

        /// Which repetition level to expand
        #[arg(long, value_enum, default_value_t = ExpandMode::Plain)]
        mode: ExpandMode,
    },

    /// Export the execution schedule as CSV
    Schedule {
        /// Protocol file (.toml or .json)
        file: PathBuf,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Hand the command over to the recorder
    Record {
        /// Protocol file (.toml or .json)
        file: PathBuf,

        /// Override data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print an example protocol
    Example {
        #[arg(long, value_enum, default_value_t = OutputFormat::Toml)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExpandMode {
    /// Each function once
    Plain,
    /// Whole sequence repeated per command repetition
    Command,
    /// Each function repeated per its own repetitions
    Function,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_validation() => {
            eprintln!("Rejected: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    stim_core::logging::init_with_level(&config.logging.level);

    match cli.command {
        Commands::Check { file } => cmd_check(&file),
        Commands::Expand { file, mode } => cmd_expand(&file, mode),
        Commands::Schedule { file, out } => cmd_schedule(&file, out.as_deref()),
        Commands::Record { file, data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| config.data.data_dir.clone());
            cmd_record(&file, &data_dir, &config)
        }
        Commands::Example { format } => cmd_example(format),
    }
}

fn load_command(file: &Path) -> Result<StimulationCommand> {
    ProtocolFile::load(file)?.build()
}

fn display_name(function: &StimulationFunction) -> &str {
    if function.name().is_empty() {
        "(unnamed)"
    } else {
        function.name()
    }
}

fn cmd_check(file: &Path) -> Result<()> {
    let command = load_command(file)?;

    println!("Command: {}", command.name());
    println!("  Tracing id:  {}", command.tracing_id());
    println!("  Functions:   {}", command.size());
    println!("  Repetitions: {}", command.repetitions());
    println!("  Duration:    {} us", command.duration());
    println!();

    for (index, function) in command.functions().enumerate() {
        let family = match function.family() {
            Some(SignalFamily::Pulse) => "pulse",
            Some(SignalFamily::Pause) => "pause",
            None => "empty",
        };
        println!(
            "  {}. {} ({}) x{}, period {} us",
            index + 1,
            display_name(function),
            family,
            function.repetitions(),
            function.period()
        );
    }

    println!("\n✓ Protocol is valid");
    Ok(())
}

fn cmd_expand(file: &Path, mode: ExpandMode) -> Result<()> {
    let command = load_command(file)?;

    let functions: Vec<&StimulationFunction> = match mode {
        ExpandMode::Plain => command.functions().collect(),
        ExpandMode::Command => command.command_repetition_aware_functions().collect(),
        ExpandMode::Function => command.repetition_aware_functions().collect(),
    };

    for function in functions {
        println!("{}", display_name(function));
    }
    Ok(())
}

fn cmd_schedule(file: &Path, out: Option<&Path>) -> Result<()> {
    let command = load_command(file)?;

    match out {
        Some(path) => {
            let count = schedule::write_csv_file(&command, path)?;
            println!("✓ Wrote {} schedule rows", count);
            println!("  CSV: {}", path.display());
        }
        None => {
            schedule::write_csv(&command, std::io::stdout().lock())?;
        }
    }
    Ok(())
}

fn cmd_record(file: &Path, data_dir: &Path, config: &Config) -> Result<()> {
    let command = load_command(file)?;
    let name = command.name().to_string();
    let tracing_id = command.tracing_id();

    let log_path = data_dir.join("handoff.jsonl");
    let mut recorder = JsonlRecorder::new(&log_path, config.implant.channel_count);
    recorder.start_stimulation(command)?;

    println!("✓ Command '{}' recorded (tracing id {})", name, tracing_id);
    println!("  Log: {}", log_path.display());
    Ok(())
}

fn cmd_example(format: OutputFormat) -> Result<()> {
    let format = match format {
        OutputFormat::Toml => Format::Toml,
        OutputFormat::Json => Format::Json,
    };
    let text = ProtocolFile::example().to_text(format)?;
    println!("{}", text.trim_end());
    Ok(())
}
