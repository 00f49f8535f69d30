use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "taxrecon")]
#[command(about = "Reconcile a tax-return microdata sample against published aggregate targets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare sample aggregates against the clean targets table
    Compare {
        /// Path to the clean targets CSV
        #[arg(long, default_value = "data/targets2017_collapsed.csv")]
        targets: PathBuf,

        /// Path to the sample file (CSV or Parquet)
        #[arg(long)]
        sample: PathBuf,

        /// Where to write the comparison report
        #[arg(short, long, default_value = "results/target_compare.txt")]
        out: PathBuf,
    },

    /// Build or fetch the targets table
    Targets {
        #[command(subcommand)]
        action: TargetsAction,
    },
}

#[derive(Subcommand)]
enum TargetsAction {
    /// Build the clean targets CSV from raw table extracts
    Build {
        /// Directory of per-table extract CSVs
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,

        /// Where to write the clean targets CSV
        #[arg(short, long, default_value = "data/targets2017_collapsed.csv")]
        out: PathBuf,
    },

    /// Download the published source files
    Download {
        /// Destination directory
        #[arg(long, default_value = "data/downloads")]
        dest: PathBuf,
    },

    /// Print the source-table registry as JSON
    Tables,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compare {
            targets,
            sample,
            out,
        } => {
            info!("Comparing {} against {}", sample.display(), targets.display());
            taxrecon::compare::run(&targets, &sample, &out)?;
            println!("Report written to {}", out.display());
        }
        Command::Targets { action } => match action {
            TargetsAction::Build { raw_dir, out } => {
                info!("Building targets from {}", raw_dir.display());
                taxrecon::build::run(&raw_dir, &out)?;
                println!("Targets written to {}", out.display());
            }
            TargetsAction::Download { dest } => {
                taxrecon::download::fetch_all(&dest).await?;
                println!("Source files saved to {}", dest.display());
            }
            TargetsAction::Tables => {
                println!("{}", taxrecon::tables::registry_json()?);
            }
        },
    }
    Ok(())
}
