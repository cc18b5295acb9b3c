use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use lexc::rules::{self, import_priorities};
use lexc::{DfaTable, Predictor};

/// Compiles a lexical rule file into a scan table, then tokenizes a source
/// program with it. The table and priority files are written to disk and read
/// back before scanning, so the artifacts on disk are exactly what a separate
/// scanner process would load.
#[derive(Parser)]
#[command(name = "lexgen")]
struct Args {
    /// Lexical rule file.
    rules: PathBuf,
    /// Source program to tokenize.
    program: PathBuf,
    /// Output path for the serialized scan table.
    #[arg(long, default_value = "scanner.dfa")]
    table: PathBuf,
    /// Output path for the token priority file.
    #[arg(long, default_value = "priorities.txt")]
    priorities: PathBuf,
    /// Also write the recognized token names, one per line.
    #[arg(long)]
    tokens_out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let rule_text = fs::read_to_string(&args.rules)
        .with_context(|| format!("failed to read rule file {}", args.rules.display()))?;
    let parsed = rules::parse_rules(&rule_text)?;
    let compiled = rules::compile_rules(&parsed)?;

    fs::write(&args.table, compiled.table().to_bytes()?)
        .with_context(|| format!("failed to write scan table {}", args.table.display()))?;
    fs::write(&args.priorities, rules::export_priorities(&compiled.priorities))
        .with_context(|| format!("failed to write priorities {}", args.priorities.display()))?;

    let table_bytes = fs::read(&args.table)
        .with_context(|| format!("failed to read scan table {}", args.table.display()))?;
    let table = DfaTable::from_bytes(&table_bytes)?;
    let priority_text = fs::read_to_string(&args.priorities)
        .with_context(|| format!("failed to read priorities {}", args.priorities.display()))?;
    let priorities = import_priorities(&priority_text)?;

    let program = fs::read_to_string(&args.program)
        .with_context(|| format!("failed to read program {}", args.program.display()))?;

    let mut names = Vec::new();
    for token in Predictor::new(table, priorities, &program) {
        println!("{}: {}", token.name, token.lexeme);
        names.push(token.name);
    }

    if let Some(path) = &args.tokens_out {
        fs::write(path, names.join("\n") + "\n")
            .with_context(|| format!("failed to write token list {}", path.display()))?;
    }
    Ok(())
}
