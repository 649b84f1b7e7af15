use derive_builder::Builder;
use nalgebra::DMatrix;
use tracing::{debug, trace};

use crate::candidates::{Block, CandidateSet};
use crate::error::{BibdError, Result};
use crate::params::{DerivedParameters, DesignParameters};

pub const DEFAULT_MAX_ITERATIONS: usize = 2_000_000;
pub const DEFAULT_MAX_CANDIDATES: usize = 1_000_000;
pub const DEFAULT_REPORT_EVERY: usize = 100_000;

/// Tunables for one search invocation.
///
/// # Fields
///
/// * `max_iterations` - Frames the search may enter before giving up
/// * `allow_repeated_blocks` - Lets one path select the same candidate more than once
/// * `max_candidates` - Upper bound on `C(v,k)` before any work is done
/// * `report_every` - Period, in iterations, of the progress callback
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(build_fn(error = "anyhow::Error"))]
pub struct SearchConfig {
    #[builder(default = "DEFAULT_MAX_ITERATIONS")]
    pub max_iterations: usize,

    #[builder(default = "false")]
    pub allow_repeated_blocks: bool,

    #[builder(default = "DEFAULT_MAX_CANDIDATES")]
    pub max_candidates: usize,

    #[builder(default = "DEFAULT_REPORT_EVERY")]
    pub report_every: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            allow_repeated_blocks: false,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

/// Blocks of a balanced selection together with the search effort it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub blocks: Vec<Block>,
    pub iterations: usize,
}

/// Record of the counter increments made when a candidate was selected.
/// Reverting it restores the state exactly as it was before selection.
#[derive(Debug)]
struct UndoToken {
    candidate: usize,
}

/// One level of the depth-first search.
#[derive(Debug)]
struct Frame {
    /// Next candidate index this level will try.
    next: usize,
    /// Candidate currently selected at this level, if any.
    chosen: Option<UndoToken>,
}

/// Counters owned by a single search. `pair_count` only uses the upper triangle.
#[derive(Debug)]
struct SearchState<'a> {
    candidates: &'a CandidateSet,
    treat_count: Vec<usize>,
    pair_count: DMatrix<usize>,
    selected: Vec<usize>,
}

impl<'a> SearchState<'a> {
    fn new(candidates: &'a CandidateSet, b: usize) -> Self {
        let v = candidates.v();
        Self {
            candidates,
            treat_count: vec![0; v],
            pair_count: DMatrix::zeros(v, v),
            selected: Vec::with_capacity(b),
        }
    }

    /// Replications still missing across all treatments.
    fn need(&self, r: usize) -> usize {
        self.treat_count.iter().map(|&c| r.saturating_sub(c)).sum()
    }

    fn admits(&self, idx: usize, r: usize, lambda: usize) -> bool {
        let block = self.candidates.block(idx);
        block.treatments().iter().all(|&t| self.treat_count[t] < r)
            && self
                .candidates
                .pairs_of(idx)
                .iter()
                .all(|p| self.pair_count[(p.lo(), p.hi())] < lambda)
    }

    fn apply(&mut self, idx: usize) -> UndoToken {
        for &t in self.candidates.block(idx).treatments() {
            self.treat_count[t] += 1;
        }
        for p in self.candidates.pairs_of(idx) {
            self.pair_count[(p.lo(), p.hi())] += 1;
        }
        self.selected.push(idx);
        UndoToken { candidate: idx }
    }

    fn revert(&mut self, token: UndoToken) {
        let idx = token.candidate;
        debug_assert_eq!(self.selected.last(), Some(&idx));
        self.selected.pop();
        for p in self.candidates.pairs_of(idx) {
            self.pair_count[(p.lo(), p.hi())] -= 1;
        }
        for &t in self.candidates.block(idx).treatments() {
            self.treat_count[t] -= 1;
        }
    }

    fn is_balanced(&self, r: usize, lambda: usize) -> bool {
        let v = self.treat_count.len();
        self.treat_count.iter().all(|&c| c == r)
            && (0..v).all(|i| ((i + 1)..v).all(|j| self.pair_count[(i, j)] == lambda))
    }

    fn blocks(&self) -> Vec<Block> {
        self.selected
            .iter()
            .map(|&idx| self.candidates.block(idx).clone())
            .collect()
    }
}

/// Selects `b` candidate blocks meeting replication `r` and co-occurrence `λ` exactly.
///
/// Depth-first over the candidate list with chronological backtracking, driven
/// by an explicit frame stack. A frame is entered once per recursive step, and
/// each entry counts against `config.max_iterations`.
///
/// # Errors
///
/// * `BibdError::SearchBudgetExceeded` - The budget ran out first
/// * `BibdError::NoDesignFound` - Every branch was exhausted within budget
pub fn search(
    params: &DesignParameters,
    derived: &DerivedParameters,
    candidates: &CandidateSet,
    config: &SearchConfig,
) -> Result<SearchOutcome> {
    search_with_progress(params, derived, candidates, config, |_, _| {})
}

/// Same as [`search`], calling `on_update(iterations, depth)` every
/// `config.report_every` iterations.
pub fn search_with_progress<F>(
    params: &DesignParameters,
    derived: &DerivedParameters,
    candidates: &CandidateSet,
    config: &SearchConfig,
    mut on_update: F,
) -> Result<SearchOutcome>
where
    F: FnMut(usize, usize),
{
    let DerivedParameters { b, r } = *derived;
    let lambda = params.lambda;
    let k = candidates.k();
    let n = candidates.len();

    debug!(v = params.v, k, lambda, b, r, candidates = n, "starting block search");

    let mut state = SearchState::new(candidates, b);
    let mut stack: Vec<Frame> = Vec::with_capacity(b + 1);
    let mut iterations = 0usize;
    let mut entering = Some(0usize);

    loop {
        if let Some(start) = entering.take() {
            iterations += 1;
            if iterations > config.max_iterations {
                debug!(iterations, "search budget exhausted");
                return Err(BibdError::SearchBudgetExceeded {
                    iterations,
                    max_iterations: config.max_iterations,
                });
            }
            if config.report_every > 0 && iterations % config.report_every == 0 {
                on_update(iterations, state.selected.len());
            }

            let depth = state.selected.len();
            if depth == b {
                if state.is_balanced(r, lambda) {
                    debug!(iterations, "balanced selection found");
                    return Ok(SearchOutcome { blocks: state.blocks(), iterations });
                }
                trace!(depth, "full selection is unbalanced");
            } else if state.need(r) > (b - depth) * k {
                trace!(depth, "capacity prune");
            } else {
                stack.push(Frame { next: start, chosen: None });
            }
        }

        let Some(frame) = stack.last_mut() else {
            debug!(iterations, "search space exhausted");
            return Err(BibdError::NoDesignFound { iterations });
        };

        if let Some(token) = frame.chosen.take() {
            state.revert(token);
        }

        match (frame.next..n).find(|&idx| state.admits(idx, r, lambda)) {
            Some(idx) => {
                frame.next = idx + 1;
                frame.chosen = Some(state.apply(idx));
                entering = Some(if config.allow_repeated_blocks { idx } else { idx + 1 });
            }
            None => {
                stack.pop();
            }
        }
    }
}
