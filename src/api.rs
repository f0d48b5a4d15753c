//! Python binding layer for the quartet tree search.
//!
//! Trees cross the boundary as Newick strings and distances as nested lists.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::distance::DistanceMatrix;
use crate::error::QuartetError;
use crate::mcmc::{SearchMethod, SolverConfig, solve_parallel};
use crate::mutation::Neighborhood;
use crate::phylo::{default_labels, from_newick, to_newick};
use crate::score::score_tree_with_distances;
use crate::splits::pairwise_rf;

fn value_error<E: std::fmt::Display>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_method(method: &str) -> PyResult<SearchMethod> {
    match method {
        "mcmc" => Ok(SearchMethod::Mcmc),
        "hill_climb" | "hill-climb" => Ok(SearchMethod::HillClimb),
        other => Err(PyValueError::new_err(format!(
            "Unknown method '{other}', expected 'mcmc' or 'hill_climb'"
        ))),
    }
}

fn parse_neighborhood(neighborhood: &str) -> PyResult<Neighborhood> {
    match neighborhood {
        "nni" => Ok(Neighborhood::Nni),
        "extended" => Ok(Neighborhood::Extended),
        other => Err(PyValueError::new_err(format!(
            "Unknown neighborhood '{other}', expected 'nni' or 'extended'"
        ))),
    }
}

/// Search for the tree that best fits a distance matrix.
///
/// Args:
///     distances: Square symmetric matrix (list of rows), zero diagonal
///     labels: Leaf names in row order (default: "0", "1", ...)
///     method: "mcmc" or "hill_climb" (default: "mcmc")
///     neighborhood: "nni" or "extended" (default: "nni")
///     seeds: One independent solve per seed, run in parallel (default: [1])
///     max_iterations: Step budget per solve (default: 200000)
///
/// Returns:
///     A tuple of (newick, score) for the best tree found
///
/// Raises:
///     ValueError: If the matrix is malformed or the options are unknown
#[pyfunction]
#[pyo3(signature = (distances, labels=None, method="mcmc", neighborhood="nni", seeds=vec![1], max_iterations=200_000))]
fn solve(
    distances: Vec<Vec<f64>>,
    labels: Option<Vec<String>>,
    method: &str,
    neighborhood: &str,
    seeds: Vec<u64>,
    max_iterations: u64,
) -> PyResult<(String, f64)> {
    let method = parse_method(method)?;
    let config = SolverConfig::default()
        .with_neighborhood(parse_neighborhood(neighborhood)?)
        .with_max_iterations(max_iterations);
    let distances = DistanceMatrix::from_rows(&distances).map_err(value_error)?;
    let n = distances.size();
    let labels = labels.unwrap_or_else(|| default_labels(n));

    let result = solve_parallel(method, n, &distances, &config, &seeds).map_err(value_error)?;
    let newick = to_newick(&result.tree, Some(labels.as_slice())).map_err(value_error)?;
    Ok((newick, result.score))
}

/// Quartet score of a Newick tree against a distance matrix.
///
/// Leaves are matched to matrix rows by sorted leaf name.
///
/// Raises:
///     ValueError: If the tree is not binary or the sizes differ
#[pyfunction]
fn score(newick: &str, distances: Vec<Vec<f64>>) -> PyResult<f64> {
    let (tree, _) = from_newick(newick).map_err(value_error)?;
    let distances = DistanceMatrix::from_rows(&distances).map_err(value_error)?;
    score_tree_with_distances(&tree, &distances).map_err(value_error)
}

/// Pairwise Robinson-Foulds distances between Newick trees on the same taxa.
///
/// Returns:
///     A 2D list of RF distances
///
/// Raises:
///     ValueError: If a tree cannot be read or the taxa differ
#[pyfunction]
fn robinson_foulds(newicks: Vec<String>) -> PyResult<Vec<Vec<usize>>> {
    let mut trees = Vec::with_capacity(newicks.len());
    let mut first_names: Option<Vec<String>> = None;
    for (idx, newick) in newicks.iter().enumerate() {
        let (tree, names) = from_newick(newick).map_err(value_error)?;
        if first_names.is_none() {
            first_names = Some(names);
        } else if first_names.as_ref() != Some(&names) {
            return Err(value_error(QuartetError::Labels(format!(
                "tree {idx} has a different leaf set than tree 0"
            ))));
        }
        trees.push(tree);
    }
    pairwise_rf(&trees).map_err(value_error)
}

/// Python module definition
#[pymodule]
fn quartet_search(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    m.add_function(wrap_pyfunction!(score, m)?)?;
    m.add_function(wrap_pyfunction!(robinson_foulds, m)?)?;
    Ok(())
}
