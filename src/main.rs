use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pretty_print_nalgebra::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bibdgen::search::{DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_ITERATIONS};
use bibdgen::{
    find_bibd_with_progress, read_labels, DesignParameters, DesignTable, RandomType,
    SearchConfigBuilder,
};

/// Generate a balanced incomplete block design and export it as CSV.
#[derive(Parser, Debug)]
#[command(name = "bibdgen", version, about)]
struct Cli {
    /// Number of treatments (v)
    #[arg(short = 'v', long = "treatments", default_value_t = 5)]
    treatments: usize,

    /// Treatments per block (k)
    #[arg(short = 'k', long, default_value_t = 3)]
    block_size: usize,

    /// Blocks shared by every pair of treatments (λ)
    #[arg(short = 'l', long, default_value_t = 3)]
    lambda: usize,

    /// Search frames to explore before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Allow the same block to appear more than once
    #[arg(long)]
    allow_repeated_blocks: bool,

    /// Refuse parameter sets with more candidate blocks than this
    #[arg(long, default_value_t = DEFAULT_MAX_CANDIDATES)]
    max_candidates: usize,

    /// CSV file supplying treatment names
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Column of the label file to read (defaults to the first)
    #[arg(long, requires = "labels")]
    label_column: Option<String>,

    /// Keep only the first occurrence of each label
    #[arg(long, requires = "labels")]
    distinct_labels: bool,

    /// Write the design here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shuffle block order and tasting order within blocks
    #[arg(long)]
    randomize: bool,

    /// Print the incidence and concurrence matrices
    #[arg(long)]
    show_matrices: bool,

    /// Log search progress
    #[arg(long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default = if verbose { "bibdgen=info" } else { "bibdgen=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let params = DesignParameters::new(cli.treatments, cli.block_size, cli.lambda);
    let config = SearchConfigBuilder::default()
        .max_iterations(cli.max_iterations)
        .allow_repeated_blocks(cli.allow_repeated_blocks)
        .max_candidates(cli.max_candidates)
        .build()?;

    let labels = match &cli.labels {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open label file {}", path.display()))?;
            let labels = read_labels(
                BufReader::new(file),
                cli.label_column.as_deref(),
                cli.distinct_labels,
            )
            .with_context(|| format!("Failed to read labels from {}", path.display()))?;
            Some(labels)
        }
        None => None,
    };

    let design = find_bibd_with_progress(params, &config, |iterations, depth| {
        info!(iterations, depth, "search progress");
    })
    .with_context(|| {
        format!(
            "No design for v={}, k={}, λ={}",
            params.v, params.k, params.lambda
        )
    })?;

    let derived = design.derived();
    eprintln!(
        "Treatments (v): {}  Block size (k): {}  Lambda (λ): {}",
        params.v, params.k, params.lambda
    );
    eprintln!("Blocks (b): {}  Replications (r): {}", derived.b, derived.r);
    eprintln!(
        "Efficiency factor: {:.4}  Search iterations: {}",
        design.efficiency_factor(),
        design.iterations()
    );

    if cli.show_matrices {
        eprintln!("incidence: {}", pretty_print!(&design.incidence_matrix()));
        eprintln!("concurrence: {}", pretty_print!(&design.concurrence_matrix()));
    }

    let table = if cli.randomize {
        let serving = design.block_array().randomized(RandomType::Uniform);
        DesignTable::from_rows(serving.to_rows(), labels.as_deref())
    } else {
        design.to_table(labels.as_deref())
    }
    .context("Failed to build design table")?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(BufWriter::new(file))?;
            info!(path = %path.display(), rows = table.len(), "design written");
        }
        None => table.write_csv(io::stdout().lock())?,
    }

    Ok(())
}
