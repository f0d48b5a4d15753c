//! Stochastic topology search.
//!
//! # Overview
//! [`step_mcmc`] is one Metropolis step: propose a random neighbor, keep it
//! if it scores higher, otherwise keep it with probability
//! `exp(beta * (proposed - current))`. [`solve_mcmc`] drives several chains
//! round-robin under an annealing schedule:
//!
//! - a phase lasts `phase_length` steps, shared between the chains;
//! - inside a phase `beta = level * (1 - exp(-8 * step / phase_length))`;
//! - after each phase the length grows by `phase_growth` and the level by
//!   `beta_growth`.
//!
//! The search stops at the first exact fit (score 1), when every chain ends
//! a phase on the same topology, or when the step budget is spent.
//! Otherwise the chains restart from fresh random trees.
//!
//! [`step_hill_climb`] / [`solve_hill_climb`] are the greedy variant: a
//! candidate is only taken when it strictly improves the score.
//!
//! Chains are strictly sequential. Independent solves parallelize through
//! [`solve_parallel`], one seeded generator per solve.

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::distance::DistanceMatrix;
use crate::error::{MatrixError, QuartetError, Result};
use crate::mutation::{Neighborhood, apply_random_mutation, new_random_tree, random_mutation};
use crate::score::score_tree_with_distances;
use crate::tree::QuartetTree;

/// Chains run side by side for `n = 4..=8`; larger trees use two.
const CHAINS_BY_LEAF_COUNT: [usize; 5] = [5, 4, 3, 3, 3];

/// Default number of chains for a tree with `leaf_count` leaves.
pub fn default_chain_count(leaf_count: usize) -> usize {
    leaf_count
        .checked_sub(4)
        .and_then(|i| CHAINS_BY_LEAF_COUNT.get(i))
        .copied()
        .unwrap_or(2)
}

/// Search strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMethod {
    #[default]
    Mcmc,
    HillClimb,
}

/// Knobs of the search. `Default` gives the reference schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    pub neighborhood: Neighborhood,
    /// Total number of steps over all chains and phases.
    pub max_iterations: u64,
    /// Number of chains; `None` picks [`default_chain_count`].
    pub chain_count: Option<usize>,
    pub initial_phase_length: u64,
    pub phase_growth: f64,
    pub initial_beta: f64,
    pub beta_growth: f64,
    /// Proposals a hill-climb step tries before reporting a local optimum.
    pub hill_climb_attempts: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            neighborhood: Neighborhood::Nni,
            max_iterations: 200_000,
            chain_count: None,
            initial_phase_length: 1024,
            phase_growth: 1.5,
            initial_beta: 5.0,
            beta_growth: 5.0 / 3.0,
            hill_climb_attempts: 200,
        }
    }
}

impl SolverConfig {
    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_chain_count(mut self, chains: usize) -> Self {
        self.chain_count = Some(chains.max(1));
        self
    }

    pub fn with_hill_climb_attempts(mut self, attempts: usize) -> Self {
        self.hill_climb_attempts = attempts.max(1);
        self
    }
}

/// Best tree found by a solve.
#[derive(Clone, Debug)]
pub struct SolveResult {
    pub tree: QuartetTree,
    pub score: f64,
    /// Steps taken over all chains.
    pub iterations: u64,
}

/// One Metropolis step on `tree`; returns the score of the tree afterwards.
pub fn step_mcmc<R: Rng + ?Sized>(
    tree: &mut QuartetTree,
    distances: &DistanceMatrix,
    beta: f64,
    neighborhood: Neighborhood,
    rng: &mut R,
) -> Result<f64> {
    let current = score_tree_with_distances(tree, distances)?;
    let candidate = random_mutation(tree, neighborhood, rng)?;
    let proposed = score_tree_with_distances(&candidate.tree, distances)?;
    let accept = proposed > current || rng.random::<f64>() < (beta * (proposed - current)).exp();
    if accept {
        trace!("accepted {:?}: {current:.6} -> {proposed:.6} (beta {beta:.3})", candidate.mutation);
        *tree = candidate.tree;
        Ok(proposed)
    } else {
        Ok(current)
    }
}

/// One greedy step: tries up to `attempts` random bursts of mutations (one
/// move, then another with probability 1/2, ...) and takes the first that
/// scores strictly higher. Returns the score afterwards, unchanged when no
/// attempt improved.
pub fn step_hill_climb<R: Rng + ?Sized>(
    tree: &mut QuartetTree,
    distances: &DistanceMatrix,
    neighborhood: Neighborhood,
    attempts: usize,
    rng: &mut R,
) -> Result<f64> {
    let current = score_tree_with_distances(tree, distances)?;
    for _ in 0..attempts {
        let mut candidate = tree.clone();
        loop {
            apply_random_mutation(&mut candidate, neighborhood, rng)?;
            if rng.random_bool(0.5) {
                break;
            }
        }
        let proposed = score_tree_with_distances(&candidate, distances)?;
        if proposed > current {
            trace!("hill climb: {current:.6} -> {proposed:.6}");
            *tree = candidate;
            return Ok(proposed);
        }
    }
    Ok(current)
}

/// Chains of one search plus the best tree seen so far.
struct Chains {
    trees: Vec<QuartetTree>,
    scores: Vec<f64>,
    best: Option<(QuartetTree, f64)>,
    iterations: u64,
}

impl Chains {
    fn new() -> Self {
        Chains { trees: Vec::new(), scores: Vec::new(), best: None, iterations: 0 }
    }

    fn restart<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        leaf_count: usize,
        distances: &DistanceMatrix,
        neighborhood: Neighborhood,
        rng: &mut R,
    ) -> Result<()> {
        self.trees = (0..count)
            .map(|_| new_random_tree(leaf_count, neighborhood, rng))
            .collect::<Result<_>>()?;
        self.scores = self
            .trees
            .iter()
            .map(|t| score_tree_with_distances(t, distances))
            .collect::<Result<_>>()?;
        for i in 0..count {
            self.record(i);
        }
        Ok(())
    }

    fn record(&mut self, chain: usize) {
        let score = self.scores[chain];
        if self.best.as_ref().is_none_or(|(_, best)| score > *best) {
            self.best = Some((self.trees[chain].clone(), score));
        }
    }

    fn best_score(&self) -> f64 {
        self.best.as_ref().map_or(0.0, |(_, s)| *s)
    }

    fn agree(&self) -> bool {
        self.trees.windows(2).all(|w| w[0] == w[1])
    }

    fn finish(self) -> Result<SolveResult> {
        let iterations = self.iterations;
        let (tree, score) = self.best.ok_or(QuartetError::NothingToSearch)?;
        debug!("search finished after {iterations} steps with score {score:.6}");
        Ok(SolveResult { tree, score, iterations })
    }
}

fn check_input(leaf_count: usize, distances: &DistanceMatrix) -> Result<()> {
    if distances.size() != leaf_count {
        return Err(MatrixError::LeafCountMismatch { expected: leaf_count, found: distances.size() }
            .into());
    }
    Ok(())
}

/// Annealed multi-chain MCMC search for the topology best fitting
/// `distances`.
///
/// # Errors
/// Leaf-count and matrix-size problems; no error is raised for running out
/// of budget, the best tree seen is returned instead.
pub fn solve_mcmc<R: Rng + ?Sized>(
    leaf_count: usize,
    distances: &DistanceMatrix,
    config: &SolverConfig,
    rng: &mut R,
) -> Result<SolveResult> {
    check_input(leaf_count, distances)?;
    let chain_count = config
        .chain_count
        .unwrap_or_else(|| default_chain_count(leaf_count))
        .max(1);
    let mut chains = Chains::new();
    let mut phase_length = config.initial_phase_length.max(1);
    let mut beta_level = config.initial_beta;

    loop {
        chains.restart(chain_count, leaf_count, distances, config.neighborhood, rng)?;
        debug!(
            "phase: {chain_count} chains, {phase_length} steps, beta level {beta_level:.3}, best {:.6}",
            chains.best_score()
        );
        for step in 0..phase_length {
            if chains.best_score() >= 1.0 || chains.iterations >= config.max_iterations {
                return chains.finish();
            }
            let beta = beta_level * (1.0 - (-8.0 * step as f64 / phase_length as f64).exp());
            let chain = (step % chain_count as u64) as usize;
            chains.scores[chain] =
                step_mcmc(&mut chains.trees[chain], distances, beta, config.neighborhood, rng)?;
            chains.iterations += 1;
            chains.record(chain);
        }
        if chains.agree() || chains.best_score() >= 1.0 {
            debug!("chains agree at phase end");
            return chains.finish();
        }
        phase_length = ((phase_length as f64) * config.phase_growth).ceil() as u64;
        beta_level *= config.beta_growth;
    }
}

/// Multi-chain greedy search. Chains climb round-robin; once every chain
/// is stuck they either agree (done) or restart from random trees.
pub fn solve_hill_climb<R: Rng + ?Sized>(
    leaf_count: usize,
    distances: &DistanceMatrix,
    config: &SolverConfig,
    rng: &mut R,
) -> Result<SolveResult> {
    check_input(leaf_count, distances)?;
    let chain_count = config
        .chain_count
        .unwrap_or_else(|| default_chain_count(leaf_count))
        .max(1);
    let mut chains = Chains::new();

    loop {
        chains.restart(chain_count, leaf_count, distances, config.neighborhood, rng)?;
        let mut stuck = vec![false; chain_count];
        while !stuck.iter().all(|&s| s) {
            for chain in 0..chain_count {
                if chains.best_score() >= 1.0 || chains.iterations >= config.max_iterations {
                    return chains.finish();
                }
                let before = chains.scores[chain];
                chains.scores[chain] = step_hill_climb(
                    &mut chains.trees[chain],
                    distances,
                    config.neighborhood,
                    config.hill_climb_attempts,
                    rng,
                )?;
                stuck[chain] = chains.scores[chain] <= before;
                chains.iterations += 1;
                chains.record(chain);
            }
        }
        debug!("all chains stuck, best {:.6}", chains.best_score());
        if chains.agree() {
            return chains.finish();
        }
    }
}

/// Dispatches to [`solve_mcmc`] or [`solve_hill_climb`].
pub fn solve<R: Rng + ?Sized>(
    method: SearchMethod,
    leaf_count: usize,
    distances: &DistanceMatrix,
    config: &SolverConfig,
    rng: &mut R,
) -> Result<SolveResult> {
    match method {
        SearchMethod::Mcmc => solve_mcmc(leaf_count, distances, config, rng),
        SearchMethod::HillClimb => solve_hill_climb(leaf_count, distances, config, rng),
    }
}

/// Runs one independent solve per seed on the rayon pool and keeps the best.
pub fn solve_parallel(
    method: SearchMethod,
    leaf_count: usize,
    distances: &DistanceMatrix,
    config: &SolverConfig,
    seeds: &[u64],
) -> Result<SolveResult> {
    let results = seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            solve(method, leaf_count, distances, config, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;
    results
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or(QuartetError::NothingToSearch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_tree;
    use crate::path::TruncatedPathMatrix;

    fn target(n: usize, seed: u64) -> (QuartetTree, DistanceMatrix) {
        let tree = new_random_tree(n, Neighborhood::Nni, &mut StdRng::seed_from_u64(seed)).unwrap();
        let dm = DistanceMatrix::from_path_matrix(&TruncatedPathMatrix::from_tree(&tree));
        (tree, dm)
    }

    #[test]
    fn test_default_chain_count() {
        let counts: Vec<usize> = (4..=10).map(default_chain_count).collect();
        assert_eq!(counts, vec![5, 4, 3, 3, 3, 2, 2]);
    }

    #[test]
    fn test_mcmc_recovers_small_trees() {
        for n in [4, 5] {
            for seed in 0..3 {
                let (truth, dm) = target(n, seed);
                let mut rng = StdRng::seed_from_u64(100 + seed);
                let result = solve_mcmc(n, &dm, &SolverConfig::default(), &mut rng).unwrap();
                assert_eq!(result.score, 1.0, "n = {n}, seed = {seed}");
                let mut found = result.tree;
                normalize_tree(&mut found).unwrap();
                assert_eq!(found, truth);
            }
        }
    }

    #[test]
    fn test_hill_climb_recovers_small_trees() {
        for n in [4, 5] {
            let (truth, dm) = target(n, 11);
            let mut rng = StdRng::seed_from_u64(5);
            let result = solve_hill_climb(n, &dm, &SolverConfig::default(), &mut rng).unwrap();
            assert_eq!(result.score, 1.0);
            assert_eq!(result.tree, truth);
        }
    }

    #[test]
    fn test_step_mcmc_with_infinite_beta_never_worsens() {
        let dm = DistanceMatrix::synthetic(8).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let mut tree = new_random_tree(8, Neighborhood::Nni, &mut rng).unwrap();
        let mut last = score_tree_with_distances(&tree, &dm).unwrap();
        for _ in 0..30 {
            let score = step_mcmc(&mut tree, &dm, f64::INFINITY, Neighborhood::Nni, &mut rng).unwrap();
            assert!(score >= last);
            assert_eq!(score, score_tree_with_distances(&tree, &dm).unwrap());
            last = score;
        }
    }

    #[test]
    fn test_budget_bounds_the_search() {
        let dm = DistanceMatrix::synthetic(12).unwrap();
        let config = SolverConfig::default().with_max_iterations(50);
        let result = solve_mcmc(12, &dm, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(result.iterations <= 50);
        assert!((0.0..=1.0).contains(&result.score));
        assert_eq!(
            result.score,
            score_tree_with_distances(&result.tree, &dm).unwrap()
        );
    }

    #[test]
    fn test_mismatched_matrix_is_rejected() {
        let dm = DistanceMatrix::synthetic(6).unwrap();
        let err = solve_mcmc(7, &dm, &SolverConfig::default(), &mut StdRng::seed_from_u64(0));
        assert!(matches!(
            err,
            Err(QuartetError::Matrix(MatrixError::LeafCountMismatch { expected: 7, found: 6 }))
        ));
    }

    #[test]
    fn test_parallel_solves() {
        let (truth, dm) = target(5, 21);
        let result =
            solve_parallel(SearchMethod::Mcmc, 5, &dm, &SolverConfig::default(), &[1, 2, 3]).unwrap();
        assert_eq!(result.score, 1.0);
        assert_eq!(result.tree, truth);
        assert!(matches!(
            solve_parallel(SearchMethod::Mcmc, 5, &dm, &SolverConfig::default(), &[]),
            Err(QuartetError::NothingToSearch)
        ));
    }
}
