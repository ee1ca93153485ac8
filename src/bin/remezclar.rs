//! Remezclar CLI - Corpus-Driven Program Remixing
//!
//! Harvest a corpus of Python sources and remix them into new programs.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use remezclar::generate::Generator;
use remezclar::{corpus, parser, Result};

/// Remezclar - remix real programs into new ones
#[derive(Parser)]
#[command(name = "remezclar")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate remixed programs from a corpus
    Generate {
        /// Corpus directory containing .py files
        #[arg(short, long, default_value = "corpus")]
        corpus: String,

        /// Seed program file; defaults to a draw from the corpus
        #[arg(short = 'f', long)]
        seed_file: Option<String>,

        /// Number of programs to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Random seed for reproducible generation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Maximum rewrite recursion depth
        #[arg(short = 'd', long, default_value = "10")]
        max_depth: usize,

        /// Full-generation attempts before giving up
        #[arg(short, long, default_value = "3")]
        retries: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Show corpus and harvest statistics
    Stats {
        /// Corpus directory containing .py files
        #[arg(short, long, default_value = "corpus")]
        corpus: String,
    },

    /// Dump the harvested inventory summary as JSON
    Harvest {
        /// Corpus directory containing .py files
        #[arg(short, long, default_value = "corpus")]
        corpus: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            corpus: corpus_dir,
            seed_file,
            count,
            seed,
            max_depth,
            retries,
            output,
        } => {
            let report = corpus::load(Path::new(&corpus_dir))?;
            for (path, err) in &report.syntax_errors {
                eprintln!("skipped {}: {err}", path.display());
            }
            let inventory = report.harvest();
            let mut generator = Generator::new(&inventory, seed)
                .with_max_depth(max_depth)
                .with_retries(retries);
            let seed_tree = match seed_file {
                Some(path) => parser::parse(&fs::read_to_string(path)?)?,
                None => generator.draw_module()?,
            };

            let mut programs = Vec::with_capacity(count);
            for _ in 0..count {
                programs.push(generator.generate_source(&seed_tree)?);
            }

            match output.as_str() {
                "json" => {
                    let items: Vec<_> = programs
                        .iter()
                        .enumerate()
                        .map(|(i, code)| {
                            serde_json::json!({
                                "index": i,
                                "seed": seed,
                                "code": code,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&items).unwrap_or_default()
                    );
                }
                _ => {
                    for (i, code) in programs.iter().enumerate() {
                        println!("--- Program {} ---", i + 1);
                        println!("{code}");
                    }
                }
            }
        }

        Commands::Stats {
            corpus: corpus_dir,
        } => {
            let report = corpus::load(Path::new(&corpus_dir))?;
            let inventory = report.harvest();
            println!("Corpus Statistics:");
            println!("  Programs parsed: {}", report.trees.len());
            println!("  Files skipped:   {}", report.syntax_errors.len());
            println!("  Node kinds:      {}", inventory.kind_count());
            println!();
            println!("Occurrences by kind:");
            for (kind, entry) in inventory.iter() {
                println!("  {:>6}  {kind:?}", entry.occurrences);
            }
        }

        Commands::Harvest {
            corpus: corpus_dir,
        } => {
            let report = corpus::load(Path::new(&corpus_dir))?;
            let inventory = report.harvest();
            let items: Vec<_> = inventory
                .iter()
                .map(|(kind, entry)| {
                    serde_json::json!({
                        "kind": format!("{kind:?}"),
                        "occurrences": entry.occurrences,
                        "candidates": entry.min_len(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&items).unwrap_or_default()
            );
        }
    }
    Ok(())
}
