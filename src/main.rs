use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use archsym::bsgs::{Bsgs, BsgsOptions, Construction};
use archsym::parse::parse_group;
use archsym::perm::PermSet;
use archsym::schreier::TransversalKind;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Implementation {
    Gap,
    Mpsym,
    Permlib,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SchreierSims {
    Deterministic,
    Random,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TransversalStorage {
    Explicit,
    SchreierTrees,
    ShallowSchreierTrees,
}

/// Profile stabilizer chain construction over a batch of permutation
/// groups given as `degree:<d>,order:<o>,gens:[...]` lines.
#[derive(Parser, Debug)]
#[command(name = "archsym", version)]
struct Cli {
    /// Implementation to dispatch to; `gap` emits a StabChain script
    /// instead of running anything.
    #[arg(short, long, value_enum, default_value_t = Implementation::Mpsym)]
    implementation: Implementation,

    /// Chain construction algorithm.
    #[arg(short, long, value_enum, default_value_t = SchreierSims::Deterministic)]
    schreier_sims: SchreierSims,

    /// Transversal storage variant.
    #[arg(short, long, value_enum, default_value_t = TransversalStorage::Explicit)]
    transversal_storage: TransversalStorage,

    /// Chain constructions per run.
    #[arg(short = 'c', long, default_value_t = 1)]
    num_cycles: usize,

    /// Timed repetitions.
    #[arg(short = 'r', long, default_value_t = 1)]
    num_runs: usize,

    #[arg(short, long)]
    verbose: bool,

    /// File with one group per line; stdin when omitted.
    groups: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "archsym=debug".into()),
            )
            .init();
    }

    let input = match &cli.groups {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read groups from stdin")?;
            buffer
        }
    };

    let options = BsgsOptions {
        construction: match cli.schreier_sims {
            SchreierSims::Deterministic => Construction::Deterministic,
            SchreierSims::Random => Construction::MonteCarlo,
        },
        transversals: match cli.transversal_storage {
            TransversalStorage::Explicit => TransversalKind::Explicit,
            TransversalStorage::SchreierTrees => TransversalKind::SchreierTrees,
            TransversalStorage::ShallowSchreierTrees => TransversalKind::ShallowSchreierTrees,
        },
        ..Default::default()
    };

    for (lineno, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let group = parse_group(line)
            .with_context(|| format!("failed to parse group on line {}", lineno + 1))?;

        match cli.implementation {
            Implementation::Gap => {
                let gens: Vec<String> =
                    group.generators().iter().map(|g| g.to_gap()).collect();
                println!("for i in [1..{}] do", cli.num_cycles);
                println!("  StabChain(Group({}));", gens.join(","));
                println!("od;");
            }
            Implementation::Mpsym => {
                for run in 0..cli.num_runs {
                    let start = Instant::now();
                    for _ in 0..cli.num_cycles {
                        let generators = PermSet::from_perms(
                            group.degree(),
                            group.generators().iter().cloned(),
                        )
                        .context("generator degrees are consistent")?;
                        let bsgs = Bsgs::new(group.degree(), generators, &options)?;
                        if &bsgs.order() != group.order() {
                            bail!(
                                "constructed chain has order {}, expected {}",
                                bsgs.order(),
                                group.order()
                            );
                        }
                    }
                    println!(
                        "degree {} order {} run {}: {:.3?}",
                        group.degree(),
                        group.order(),
                        run + 1,
                        start.elapsed()
                    );
                }
            }
            Implementation::Permlib => bail!("permlib backend is not supported"),
        }
    }

    Ok(())
}
