//! Mixes two successor-probability JSON tables into one, weighting each
//! by a caller-supplied factor and renormalizing every row to sum to 1.0.
//!
//! Grounded in `original_source/tools/psyz-ProcessSysCallData/mixDTPrope.go`:
//! two tables of the same key dialect (typically one built from a stock
//! corpus and one from a targeted one) get combined before being fed to
//! [`syzprio::priority::PriorityComposer::fold_successor`].

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mix-probabilities", about = "Mix two successor-probability JSON tables")]
struct Args {
    /// First `{caller: {callee: probability}}` JSON table.
    #[arg(long)]
    first: PathBuf,

    /// Second table, same key dialect as `first`.
    #[arg(long)]
    second: PathBuf,

    /// Weight given to `first` before renormalization.
    #[arg(long, default_value_t = 0.5)]
    factor_first: f64,

    /// Weight given to `second` before renormalization.
    #[arg(long, default_value_t = 0.5)]
    factor_second: f64,

    #[arg(long, short)]
    output: PathBuf,
}

type Table = BTreeMap<String, BTreeMap<String, f64>>;

fn main() -> syzprio::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let first: Table = serde_json::from_str(&fs::read_to_string(&args.first)?)?;
    let second: Table = serde_json::from_str(&fs::read_to_string(&args.second)?)?;

    let mut mixed: Table = BTreeMap::new();
    for (caller, row) in &first {
        let entry = mixed.entry(caller.clone()).or_default();
        for (callee, &prob) in row {
            *entry.entry(callee.clone()).or_insert(0.0) += prob * args.factor_first;
        }
    }
    for (caller, row) in &second {
        let entry = mixed.entry(caller.clone()).or_default();
        for (callee, &prob) in row {
            *entry.entry(callee.clone()).or_insert(0.0) += prob * args.factor_second;
        }
    }

    for row in mixed.values_mut() {
        let total: f64 = row.values().sum();
        if total > 0.0 {
            for v in row.values_mut() {
                *v /= total;
            }
        }
    }

    tracing::info!(callers = mixed.len(), "mixed successor tables");
    fs::write(&args.output, serde_json::to_string_pretty(&mixed)?)?;
    Ok(())
}
