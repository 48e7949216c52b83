//! Builds a successor-probability table from a directory of syscall
//! sequence files, translating syscall names to internal IDs on the way in.
//!
//! Grounded in
//! `original_source/tools/psyz-ProcessSysCallData/loadSysCallDataSet.go`:
//! `-s` points at a `syscallIDs.txt` file of `"<id> <name>"` lines (produced
//! by the original's `genSyscallIDs.sh`); `-d` points at a directory where
//! each file holds one `|`-separated syscall-name sequence per line. For
//! every adjacent pair in every sequence, count the transition, then
//! normalize each caller's row to sum to 1.0. The resulting JSON is in the
//! `DongTingSyzk` key dialect since it's derived straight from ID sequences
//! rather than kernel call numbers.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "seq-ingest", about = "Build a successor-probability table from named syscall sequence files")]
struct Args {
    /// File of `<id> <name>` pairs mapping syscall names to internal IDs.
    #[arg(short = 's', long = "syscall-ids")]
    syscall_ids: PathBuf,

    /// Directory containing one file per sequence, each holding a single
    /// line of `|`-separated syscall names.
    #[arg(short = 'd', long = "input-dir")]
    input_dir: PathBuf,

    #[arg(short = 'o', long)]
    output: PathBuf,
}

fn load_syscall_ids(path: &PathBuf) -> std::io::Result<HashMap<String, u32>> {
    let mut name_to_id = HashMap::new();
    for line in fs::read_to_string(path)?.lines() {
        let mut parts = line.splitn(2, ' ');
        let (Some(id), Some(name)) = (parts.next(), parts.next()) else { continue };
        if let Ok(id) = id.parse::<u32>() {
            name_to_id.insert(name.to_string(), id);
        }
    }
    Ok(name_to_id)
}

fn main() -> syzprio::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let name_to_id = load_syscall_ids(&args.syscall_ids)?;
    tracing::info!(syscalls = name_to_id.len(), "loaded syscall ID map");

    let mut counts: BTreeMap<u32, BTreeMap<u32, u64>> = BTreeMap::new();
    let mut sequences_read = 0usize;
    for entry in fs::read_dir(&args.input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let contents = fs::read_to_string(entry.path())?;
        for line in contents.lines() {
            let ids: Vec<u32> = line.split('|').filter_map(|name| name_to_id.get(name).copied()).collect();
            for pair in ids.windows(2) {
                *counts.entry(pair[0]).or_default().entry(pair[1]).or_insert(0) += 1;
            }
            if !ids.is_empty() {
                sequences_read += 1;
            }
        }
    }
    tracing::info!(sequences_read, callers = counts.len(), "ingested sequence files");

    let mut probabilities: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (caller, callees) in &counts {
        let total: u64 = callees.values().sum();
        let row = callees.iter().map(|(&callee, &count)| (callee.to_string(), count as f64 / total as f64)).collect();
        probabilities.insert(caller.to_string(), row);
    }

    fs::write(&args.output, serde_json::to_string_pretty(&probabilities)?)?;
    Ok(())
}
