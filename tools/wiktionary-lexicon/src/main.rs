use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wiktionary_lexicon::config::MAJOR_VERSION;
use wiktionary_lexicon::export::{export_klld, KlldTarget};
use wiktionary_lexicon::pool::{run_jobs, PoolConfig};
use wiktionary_lexicon::{run_job, Directories, JobOptions, JobPaths, LanguageConfig};

#[derive(Parser)]
#[command(name = "wiktionary-lexicon")]
#[command(about = "Build per-language lexicon stores and KLLD dictionaries from Wiktionary JSONL dumps")]
struct Args {
    /// Language tables (defaults to the built-in schema/languages.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build lexicon stores for one gloss language
    Build {
        /// Gloss (definition) language code
        gloss_lang: String,

        /// Lemma languages to build (default: all supported for the gloss language)
        #[arg(long, num_args = 1..)]
        lemma_langs: Vec<String>,

        /// Directory holding `{lang}/{lang}_{edition}.jsonl[.bz2]` dumps
        #[arg(long, default_value = "build/source")]
        input_dir: PathBuf,

        /// Directory holding difficulty, frequency and conversion tables
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output directory for stores and dictionaries
        #[arg(long, default_value = "build")]
        output_dir: PathBuf,

        /// Worker threads (default: available CPUs)
        #[arg(long)]
        threads: Option<usize>,

        /// Skip writing KLLD dictionaries
        #[arg(long)]
        no_export: bool,

        /// Hide progress spinners and statistics
        #[arg(long, short)]
        quiet: bool,
    },
    /// Export a finished lexicon store as a KLLD dictionary
    Export {
        /// Lexicon store (.db)
        store: PathBuf,

        #[arg(long)]
        lemma_lang: String,

        #[arg(long)]
        gloss_lang: String,

        /// Output file (default: next to the store)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => LanguageConfig::load(path)
            .with_context(|| format!("loading language tables from {}", path.display()))?,
        None => LanguageConfig::builtin().context("loading built-in language tables")?,
    };

    match args.command {
        Command::Build {
            gloss_lang,
            lemma_langs,
            input_dir,
            data_dir,
            output_dir,
            threads,
            no_export,
            quiet,
        } => {
            let jobs = match config.resolve_jobs(&gloss_lang, &lemma_langs) {
                Ok(jobs) => jobs,
                Err(e) if e.is_unsupported_language() => {
                    error!("{}", e);
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => return Err(e.into()),
            };

            let dirs = Directories {
                input: input_dir,
                data: data_dir,
                output: output_dir,
            };
            let pool = match threads {
                Some(n) => PoolConfig { num_threads: n.max(1) },
                None => PoolConfig::default(),
            };
            let options = JobOptions {
                progress: !quiet,
                export: !no_export,
                multi: (!quiet).then(MultiProgress::new),
            };

            if !quiet {
                println!("Gloss language: {}", gloss_lang);
                println!(
                    "Lemma languages: {}",
                    jobs.iter()
                        .map(|j| j.lemma_lang.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!("Output: {}", dirs.output.display());
                println!("Threads: {}", pool.num_threads);
                println!();
            }

            let start_time = Instant::now();
            let outcomes = run_jobs(jobs, &pool, |spec| {
                let paths = JobPaths::new(&dirs, spec, &config);
                run_job(&config, spec, &paths, &options)
            });

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(stats) => {
                        if !quiet {
                            stats.print(&outcome.spec);
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        error!(job = %outcome.spec.pair(), "{}", e);
                    }
                }
            }

            let elapsed = start_time.elapsed();
            info!(
                jobs = outcomes.len(),
                failed,
                elapsed_s = elapsed.as_secs(),
                "build finished"
            );
            Ok(if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Export {
            store,
            lemma_lang,
            gloss_lang,
            output,
        } => {
            let output = output.unwrap_or_else(|| {
                store.with_file_name(format!("kll.{lemma_lang}.{gloss_lang}_v{MAJOR_VERSION}.klld"))
            });
            let target = KlldTarget {
                lemma_lang: &lemma_lang,
                gloss_code: &gloss_lang,
                strip_bidi: config.is_bidi_gloss(&gloss_lang),
            };
            let stats = export_klld(&store, &output, &target)
                .with_context(|| format!("exporting {}", store.display()))?;
            println!("Lemmas: {}", stats.lemmas);
            println!("Senses: {}", stats.senses);
            println!("Output: {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
