/// HLML CLI (hlml)
/// Orchestrates the build, chk, and batch commands.

use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use hlml::diagnostics::Report;
use hlml::Loader;

#[derive(ClapParser)]
#[command(
    name = "hlml",
    version = "0.1.0",
    about = "The HLML compiler",
    long_about = "hlml — compile .hlml sources to Mindustry logic (.mlog) programs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one target and write `<target>.mlog`
    Build {
        /// Bare target name; `t` compiles `t.hlml`
        target: String,
        /// Include directories searched for sources (default: the current
        /// directory)
        #[arg(short = 'I', long = "include")]
        include: Vec<PathBuf>,
        /// Directory the .mlog output is written into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Dump per-stage artifacts (contents, tokens, declarations) here
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Check a target without writing any output
    Chk {
        target: String,
        #[arg(short = 'I', long = "include")]
        include: Vec<PathBuf>,
    },
    /// Compile every .hlml under the include directories as an independent
    /// target
    Batch {
        #[arg(short = 'I', long = "include")]
        include: Vec<PathBuf>,
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
}

fn include_dirs(include: Vec<PathBuf>) -> Vec<PathBuf> {
    if include.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        include
    }
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Build {
            target,
            include,
            out_dir,
            artifacts,
        } => {
            let loader = Loader::new(include_dirs(include));
            build_one(loader, artifacts, &target, &out_dir)?;
        }

        Commands::Chk { target, include } => {
            let loader = Loader::new(include_dirs(include));
            hlml::checker::Checker::new(loader, None)
                .check(&target)
                .map_err(|diagnostic| Report::from_diagnostic(&diagnostic))?;
            println!("{} no issues found in '{}'", "✓".green(), target);
        }

        Commands::Batch {
            include,
            out_dir,
            artifacts,
        } => {
            let include = include_dirs(include);
            let targets = Loader::new(include.clone()).discover_targets();
            let mut failures = 0usize;
            for target in &targets {
                let loader = Loader::new(include.clone());
                match build_one(loader, artifacts.clone(), target, &out_dir) {
                    Ok(()) => {}
                    Err(report) => {
                        failures += 1;
                        eprintln!("{report:?}");
                    }
                }
            }
            println!(
                "{} {} of {} targets compiled",
                if failures == 0 { "✓".green() } else { "✗".red() },
                targets.len() - failures,
                targets.len()
            );
            if failures > 0 {
                return Err(miette::miette!("{} targets failed", failures));
            }
        }
    }
    Ok(())
}

/// Compile one target and write its output file. The output is only opened
/// after the whole pipeline has succeeded; a failed target leaves no file
/// behind.
fn build_one(
    loader: Loader,
    artifacts: Option<PathBuf>,
    target: &str,
    out_dir: &PathBuf,
) -> Result<()> {
    let text = hlml::compile(loader, artifacts, target)
        .map_err(|diagnostic| Report::from_diagnostic(&diagnostic))?;
    std::fs::create_dir_all(out_dir).into_diagnostic()?;
    let path = out_dir.join(format!("{}.mlog", target));
    std::fs::write(&path, text).into_diagnostic()?;
    println!("{} {} -> {}", "✓".green(), target, path.display());
    Ok(())
}
