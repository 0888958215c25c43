use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use common::GlobalOpts;
use dispatch::render::stub_file_name;
use dispatch::{render, render_stubs, resolve, CsvSource, Program, TableSource};

mod config;

#[derive(Debug, Parser)]
#[clap(name = "lookup-gen", version, disable_help_flag = true, disable_version_flag = true)]
#[clap(about = "Generates instruction lookup functions from CSV instruction tables")]
struct Cli {
    #[clap(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Directory holding the instruction tables.
    #[arg(long, value_name = "DIR")]
    tables: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build every reachable table and write the lookup module.
    Generate {
        #[clap(flatten)]
        source: SourceArgs,

        /// Output file, stdout if not given here or in the config.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also write one handler stub module per table into this directory.
        #[arg(long, value_name = "DIR")]
        stubs: Option<PathBuf>,
    },
    /// Decode instruction words with the tables, without generating code.
    Query {
        #[clap(flatten)]
        source: SourceArgs,

        /// Instruction words, hex with a 0x prefix or decimal.
        #[arg(required = true, value_name = "WORD", value_parser = parse_word)]
        words: Vec<u32>,
    },
    /// List the tables reachable from the root and what they delegate to.
    Tables {
        #[clap(flatten)]
        source: SourceArgs,
    },
}

fn parse_word(text: &str) -> Result<u32, String> {
    let text = text.replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("`{text}` is not a 32 bit instruction word: {e}"))
}

fn source(config: &config::Config, args: &SourceArgs) -> CsvSource {
    let mut source = config.source.clone();
    if let Some(dir) = &args.tables {
        source.directory = dir.clone();
    }
    source
}

fn build(source: &mut CsvSource) -> anyhow::Result<Program> {
    let program = resolve(source).with_context(|| {
        format!("failed to build lookup tables from {}", source.directory.display())
    })?;
    log::info!("Built {} tables", program.tables.len());
    Ok(program)
}

fn generate(config: &config::Config, args: &SourceArgs, output: Option<PathBuf>, stubs: Option<PathBuf>) -> anyhow::Result<()> {
    let mut source = source(config, args);
    let program = build(&mut source)?;

    let lookup = render(&program, &config.render)?;
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    if let Some(dir) = stubs.or_else(|| config.stubs_dir.clone()) {
        for table in &program.tables {
            files.push((dir.join(stub_file_name(&table.name)), render_stubs(table, &config.render)?));
        }
    }

    // Nothing is written until every table rendered.
    match output.or_else(|| config.output.clone()) {
        Some(path) => write(&path, &lookup)?,
        None => print!("{lookup}"),
    }
    for (path, text) in files {
        write(&path, &text)?;
    }
    Ok(())
}

fn write(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn query(config: &config::Config, args: &SourceArgs, words: &[u32]) -> anyhow::Result<()> {
    let mut source = source(config, args);
    let program = build(&mut source)?;

    let mut failures = 0;
    for &word in words {
        let instruction = mips::Instruction::new(word);
        match program.lookup(&instruction) {
            Ok((table, leaf)) => println!("{word:#010x}  {table}  {}  cycles {}", leaf.handler, leaf.cycles),
            Err(failure) => {
                failures += 1;
                println!("{word:#010x}  {failure}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} instructions did not decode", words.len());
    }
    Ok(())
}

fn tables(config: &config::Config, args: &SourceArgs) -> anyhow::Result<()> {
    let mut source = source(config, args);
    let program = build(&mut source)?;

    for table in &program.tables {
        let delegates: Vec<String> = table.emission.delegates.iter().map(|d| d.to_string()).collect();
        let path = source.locate(&table.name).map(|p| p.display().to_string()).unwrap_or_default();
        println!(
            "{}\t{}\t{} handlers\t-> [{}]",
            table.name,
            path,
            table.emission.handlers.len(),
            delegates.join(", ")
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    common::logging::init(cli.global.level())?;

    let config = config::load(cli.global.config_path().as_deref())?;
    match cli.command {
        Command::Generate { source, output, stubs } => generate(&config, &source, output, stubs),
        Command::Query { source, words } => query(&config, &source, &words),
        Command::Tables { source } => tables(&config, &source),
    }
}
