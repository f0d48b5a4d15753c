use clap::{Parser, ValueEnum};
use quartet_search::distance::DistanceMatrix;
use quartet_search::hash::tree_hash_hex;
use quartet_search::io::{read_matrix_tsv, read_text, write_matrix_tsv, write_text};
use quartet_search::mcmc::{SearchMethod, SolverConfig, default_chain_count, solve_parallel};
use quartet_search::mutation::Neighborhood;
use quartet_search::path::TruncatedPathMatrix;
use quartet_search::phylo::{default_labels, from_newick, to_newick};
use quartet_search::splits::robinson_foulds;
use quartet_search::tree::QuartetTree;
use std::path::PathBuf;
use std::time::Instant;

/// Search for the unrooted binary tree whose quartet topologies best agree
/// with a distance matrix, and write it as Newick.
#[derive(Parser, Debug)]
#[command(name = "quartet-search", version, about = "Quartet tree search over a distance matrix")]
struct Args {
    /// Labeled TSV distance matrix (.gz accepted)
    #[arg(short = 'i', long = "input", conflicts_with_all = ["newick", "leaves"])]
    input: Option<PathBuf>,

    /// Newick file of a reference tree; its path lengths become the distances
    #[arg(long = "newick", conflicts_with = "leaves")]
    newick: Option<PathBuf>,

    /// Use the built-in synthetic matrix over N leaves
    #[arg(short = 'n', long = "leaves")]
    leaves: Option<usize>,

    /// Search method: mcmc | hill-climb
    #[arg(long = "method", value_enum, default_value_t = MethodArg::Mcmc)]
    method: MethodArg,

    /// Candidate moves: nni | extended
    #[arg(long = "neighborhood", value_enum, default_value_t = NeighborhoodArg::Nni)]
    neighborhood: NeighborhoodArg,

    /// Seed of one independent solve; repeat to run several in parallel
    #[arg(short = 's', long = "seed", default_values_t = [1u64])]
    seeds: Vec<u64>,

    /// Step budget per solve
    #[arg(long = "max-iterations", default_value_t = 200_000)]
    max_iterations: u64,

    /// Number of chains (default depends on the leaf count)
    #[arg(long = "chains")]
    chains: Option<usize>,

    /// Output path for the Newick tree (`-` for stdout, `.gz` compresses)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Also write the leaf path-length matrix of the result as TSV
    #[arg(long = "matrix")]
    matrix: Option<PathBuf>,

    /// Quiet mode: suppresses progress messages on stderr
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MethodArg { Mcmc, HillClimb }

#[derive(Copy, Clone, Debug, ValueEnum)]
enum NeighborhoodArg { Nni, Extended }

fn main() {
    env_logger::init();
    let args = Args::parse();

    // Distances and labels
    let t0 = Instant::now();
    let (labels, distances, reference) = match load_input(&args) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Failed to load input: {e}");
            std::process::exit(2);
        }
    };
    let n = distances.size();
    let read_s = t0.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Loaded distances over {n} leaves {read_s:.3}s"));

    let method = match args.method {
        MethodArg::Mcmc => SearchMethod::Mcmc,
        MethodArg::HillClimb => SearchMethod::HillClimb,
    };
    let neighborhood = match args.neighborhood {
        NeighborhoodArg::Nni => Neighborhood::Nni,
        NeighborhoodArg::Extended => Neighborhood::Extended,
    };
    let mut config = SolverConfig::default()
        .with_neighborhood(neighborhood)
        .with_max_iterations(args.max_iterations);
    if let Some(chains) = args.chains {
        config = config.with_chain_count(chains);
    }

    // Search
    let t1 = Instant::now();
    log_if(!args.quiet, format!(
        "Searching with {:?} over {} seed(s), {} chain(s) each",
        method,
        args.seeds.len(),
        config.chain_count.unwrap_or_else(|| default_chain_count(n)),
    ));
    let result = match solve_parallel(method, n, &distances, &config, &args.seeds) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Search failed: {e}");
            std::process::exit(3);
        }
    };
    let search_s = t1.elapsed().as_secs_f64();
    log_if(!args.quiet, format!(
        "Best score {:.6} after {} steps {search_s:.3}s (tree {})",
        result.score,
        result.iterations,
        tree_hash_hex(&result.tree),
    ));
    if let Some(reference) = &reference {
        match robinson_foulds(reference, &result.tree) {
            Ok(rf) => log_if(!args.quiet, format!("RF distance to the input tree: {rf}")),
            Err(e) => eprintln!("Could not compare with the input tree: {e}"),
        }
    }

    // Output
    let t2 = Instant::now();
    let newick = match to_newick(&result.tree, Some(labels.as_slice())) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to format result: {e}");
            std::process::exit(3);
        }
    };
    if let Err(e) = write_text(&args.output, &newick) {
        eprintln!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    if let Some(path) = &args.matrix {
        let rows = TruncatedPathMatrix::from_tree(&result.tree).to_rows();
        if let Err(e) = write_matrix_tsv(path, &labels, &rows) {
            eprintln!("Failed to write matrix {path:?}: {e}");
            std::process::exit(4);
        }
    }
    let write_s = t2.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Writing output {write_s:.3}s"));
}

type Input = (Vec<String>, DistanceMatrix, Option<QuartetTree>);

fn load_input(args: &Args) -> Result<Input, Box<dyn std::error::Error>> {
    if let Some(path) = &args.input {
        let (names, rows) = read_matrix_tsv(path)?;
        return Ok((names, DistanceMatrix::from_rows(&rows)?, None));
    }
    if let Some(path) = &args.newick {
        let (tree, names) = from_newick(&read_text(path)?)?;
        let distances = DistanceMatrix::from_path_matrix(&TruncatedPathMatrix::from_tree(&tree));
        return Ok((names, distances, Some(tree)));
    }
    let n = args.leaves.ok_or("one of --input, --newick or --leaves is required")?;
    Ok((default_labels(n), DistanceMatrix::synthetic(n)?, None))
}

fn log_if(show: bool, msg: String) {
    if show { eprintln!("{}", msg); }
}
