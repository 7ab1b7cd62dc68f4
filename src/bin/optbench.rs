//! Batch entry points over the benchmark catalog.
//!
//! Verbosity is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use optbench::audit::{AuditOptions, PropertyValidator};
use optbench::batch::BatchSummary;
use optbench::catalog;
use optbench::consistency::{ConsistencyChecker, ConsistencyOptions};
use optbench::listing;
use optbench::record::EntryDef;
use optbench::refine::{ChangeLog, PrecisionRefiner, RefineOptions, RefineOutcome};
use optbench::registry::Registry;
use optbench::store::CatalogStore;

#[derive(Parser, Debug)]
#[command(name = "optbench")]
#[command(about = "Benchmark function catalog with verified global minima")]
#[command(version)]
struct Cli {
    /// Directory of TOML records overlaid onto the built-in catalog
    #[arg(long, global = true, value_name = "DIR")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the catalog as Markdown
    List {
        /// Only print the entry of this name
        #[arg(long)]
        name: Option<String>,
    },
    /// Audit claimed properties by sampling
    Audit {
        /// Number of samples per check
        #[arg(long, default_value_t = 64)]
        samples: usize,
        /// Seed of the random generator
        #[arg(long, default_value_t = 0x5eed)]
        seed: u64,
    },
    /// Check recorded minima against the formulas
    Check {
        /// Value tolerance for literature minima
        #[arg(long, default_value_t = 1e-9)]
        tol: f64,
    },
    /// Refine minima in extended precision
    Refine {
        /// Refine entries in parallel
        #[arg(long)]
        parallel: bool,
        /// Append accepted changes to this file
        #[arg(long, value_name = "PATH")]
        changelog: Option<PathBuf>,
        /// Iteration budget per entry
        #[arg(long, default_value_t = 2000)]
        max_iters: usize,
    },
    /// Write every entry as a TOML record
    Export {
        /// Target directory
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let store = cli
        .catalog
        .as_ref()
        .map(CatalogStore::open)
        .transpose()
        .context("cannot open catalog directory")?;

    let defs = load_defs(store.as_ref())?;
    let (registry, errors) = Registry::load(defs);
    for error in &errors {
        log::error!("{}", error);
    }
    info!("{} functions registered", registry.len());

    let summary = match cli.command {
        Command::List { name } => {
            match name {
                Some(name) => {
                    let entry = registry.lookup(&name)?;
                    let n = registry.resolver().resolve(&entry, None).ok();
                    print!("{}", listing::render_entry(&entry, n));
                }
                None => print!("{}", listing::render(&registry)),
            }
            return Ok(if errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Audit { samples, seed } => {
            let mut options = AuditOptions::default();
            options.set_samples(samples).set_seed(seed);

            let validator = PropertyValidator::with_options(options, registry.resolver().clone());
            let (reports, summary) = validator.audit_all(&registry);

            for (name, report) in reports {
                match report {
                    Ok(report) => {
                        for finding in report.violations() {
                            println!(
                                "{}: {} violated ({})",
                                name, finding.property, finding.detail
                            );
                        }
                    }
                    Err(error) => println!("{}: {}", name, error),
                }
            }
            summary
        }
        Command::Check { tol } => {
            let mut options = ConsistencyOptions::default();
            options.set_literature_tol(tol);

            let (results, summary) = ConsistencyChecker::with_options(options).check_all(&registry);

            for (name, result) in results {
                match result {
                    Ok(report) if report.is_consistent() => {
                        println!(
                            "{}: ok (n = {}, max residual {:.3e})",
                            name,
                            report.n,
                            report.max_residual()
                        );
                    }
                    Ok(report) => {
                        for discrepancy in &report.discrepancies {
                            println!("{}: {:?}", name, discrepancy);
                        }
                    }
                    Err(error) => println!("{}: {}", name, error),
                }
            }
            summary
        }
        Command::Refine {
            parallel,
            changelog,
            max_iters,
        } => {
            let mut options = RefineOptions::default();
            options.set_max_iters(max_iters);

            let mut refiner = PrecisionRefiner::with_options(options);
            if let Some(store) = store {
                refiner = refiner.with_store(store);
            }

            let log = match changelog {
                Some(path) => ChangeLog::open(&path)
                    .with_context(|| format!("cannot open change log {}", path.display()))?,
                None => ChangeLog::new(std::io::stdout()),
            };

            let (outcomes, summary) = if parallel {
                refiner.run_parallel(&registry, &log)?
            } else {
                refiner.run(&registry, &log)?
            };

            for (name, outcome) in outcomes {
                if let RefineOutcome::Failed(error) = outcome {
                    println!("{}: {}", name, error);
                }
            }
            summary
        }
        Command::Export { dir } => {
            let target = CatalogStore::open(&dir)
                .with_context(|| format!("cannot open {}", dir.display()))?;
            let entries: Vec<_> = registry.iter().collect();
            let count = target.export(entries.iter().map(|entry| &**entry))?;

            let mut summary = BatchSummary::new("exported");
            for _ in 0..count {
                summary.success();
            }
            summary
        }
    };

    let summary = with_registration_errors(summary, errors.len());
    println!("{}", summary);
    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_defs(store: Option<&CatalogStore>) -> anyhow::Result<Vec<EntryDef>> {
    let defs = catalog::builtin();
    match store {
        Some(store) => store
            .overlay(defs)
            .with_context(|| format!("cannot read catalog {}", store.dir().display())),
        None => Ok(defs),
    }
}

/// Counts entries rejected at registration as failures of the batch.
fn with_registration_errors(mut summary: BatchSummary, errors: usize) -> BatchSummary {
    for _ in 0..errors {
        summary.failure();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_errors_fail_the_batch() {
        let mut summary = BatchSummary::new("checked");
        summary.success();
        summary.skip();

        let summary = with_registration_errors(summary, 2);

        assert!(!summary.is_clean());
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.processed, 4);
    }

    #[test]
    fn clean_registration_keeps_the_summary() {
        let mut summary = BatchSummary::new("checked");
        summary.success();

        let summary = with_registration_errors(summary, 0);

        assert!(summary.is_clean());
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn cli_arguments_parse() {
        let cli = Cli::parse_from(["optbench", "--catalog", "records", "check", "--tol", "1e-6"]);

        assert_eq!(cli.catalog, Some(PathBuf::from("records")));
        assert!(matches!(cli.command, Command::Check { tol } if tol == 1e-6));
    }
}
