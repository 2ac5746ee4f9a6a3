use std::io::BufWriter;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nv2a_shader::{
    convert_log,
    disassemble::{Disassembler, ExternalDisassembler, WordDisassembler},
    extract::LogFormat,
    program::DedupPolicy,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log each processing step.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert vertex shaders from xemu shader dumps to assembly.
    Xemu(ConvertArgs),
    /// Convert vertex shaders from xemu-style pgraph traces to assembly.
    Pgraph(ConvertArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// The log file containing the vertex shader(s) to process.
    source_file: String,

    /// The disassembler executable for the instruction words.
    /// If not specified, the raw words are printed as comments.
    #[arg(short, long)]
    disassembler: Option<String>,

    /// Additional arguments passed to the disassembler.
    #[arg(long, requires = "disassembler", allow_hyphen_values = true)]
    disassembler_arg: Vec<String>,

    /// Override how identical programs are handled.
    /// Defaults to unique for xemu and keep-all for pgraph.
    #[arg(long)]
    dedup: Option<Dedup>,
}

#[derive(Copy, PartialEq, Clone, Eq, ValueEnum)]
enum Dedup {
    Unique,
    KeepAll,
}

impl From<Dedup> for DedupPolicy {
    fn from(value: Dedup) -> Self {
        match value {
            Dedup::Unique => DedupPolicy::Unique,
            Dedup::KeepAll => DedupPolicy::KeepAll,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    simple_logger::SimpleLogger::new().with_level(level).init()?;

    let (format, args) = match cli.command {
        Commands::Xemu(args) => (LogFormat::Xemu, args),
        Commands::Pgraph(args) => (LogFormat::Pgraph, args),
    };

    let policy = args
        .dedup
        .map(Into::into)
        .unwrap_or(format.default_dedup_policy());

    let disassembler: Box<dyn Disassembler> = match &args.disassembler {
        Some(program) => {
            Box::new(ExternalDisassembler::new(program).with_args(args.disassembler_arg.clone()))
        }
        None => Box::new(WordDisassembler),
    };

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    convert_log(
        &args.source_file,
        format,
        policy,
        disassembler.as_ref(),
        &mut writer,
    )
    .with_context(|| format!("failed to convert {:?}", args.source_file))
}
