//! Extracts 2-gram transition probabilities from a directory of sequence
//! files.
//!
//! Each input file holds one program as whitespace-separated decimal
//! syscall IDs. The original tool read these pairs out of the syzkaller
//! corpus database directly; that on-disk format is out of scope here; a
//! plain sequence-file directory covers the same need: producing a
//! bigram table from a corpus of programs, from whatever already has
//! them as ID lists.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use syzprio::twogram::TwoGramTable;

#[derive(Parser, Debug)]
#[command(name = "bigram-extract", about = "Extract 2-gram transition probabilities from syscall sequence files")]
struct Args {
    /// Directory containing one whitespace-separated syscall-ID sequence
    /// per file.
    #[arg(long, env = "BIGRAM_EXTRACT_INPUT_DIR")]
    input_dir: PathBuf,

    /// Where to write the resulting `{caller: {callee: probability}}` JSON
    /// — the same shape `SuccessorTable::from_json` reads back in.
    #[arg(long, short, env = "BIGRAM_EXTRACT_OUTPUT")]
    output: PathBuf,
}

fn main() -> syzprio::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let table = TwoGramTable::new();
    let mut files_read = 0usize;
    for entry in fs::read_dir(&args.input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let contents = fs::read_to_string(entry.path())?;
        let ids: Vec<u32> = contents.split_whitespace().filter_map(|t| t.parse().ok()).collect();
        if ids.len() < 2 {
            continue;
        }
        table.add_program(&ids);
        files_read += 1;
    }
    tracing::info!(files_read, "ingested sequence files");

    let mut probabilities = std::collections::BTreeMap::new();
    for caller in table.callers() {
        let row = table.row(caller).unwrap_or_default();
        probabilities.insert(caller.to_string(), row.into_iter().map(|(k, v)| (k.to_string(), v)).collect());
    }

    let json = serde_json::to_string_pretty(&probabilities)?;
    fs::write(&args.output, json)?;
    tracing::info!(output = %args.output.display(), "wrote bigram table");
    Ok(())
}
