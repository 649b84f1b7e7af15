mod random_type;

pub mod block_array;
pub mod candidates;
pub mod coincidence_matrix;
pub mod design;
pub mod error;
pub mod params;
pub mod search;
pub mod table;

pub use candidates::{generate_candidates, Block, CandidateSet, Pair};
pub use design::Design;
pub use error::{BibdError, Infeasibility};
pub use params::{validate, DerivedParameters, DesignParameters};
pub use random_type::{permute_b, RandomType};
pub use search::{search, search_with_progress, SearchConfig, SearchConfigBuilder, SearchOutcome};
pub use table::{
    parse_design_csv, read_labels, to_table, treatment_code, treatment_index, DesignTable, TableRow,
};

use tracing::{debug, info};

/// Finds a balanced incomplete block design for the given parameters.
///
/// # Arguments
///
/// * `params` - Treatments `v`, block size `k` and pair co-occurrence `λ`
/// * `config` - Iteration budget and other search limits
///
/// # Errors
///
/// * `BibdError::InfeasibleParameters` - `(v, k, λ)` fails the integrality checks; no search
///   is run
/// * `BibdError::CandidateLimitExceeded` - `C(v,k)` is above `config.max_candidates`
/// * `BibdError::NoDesignFound` / `BibdError::SearchBudgetExceeded` - The search failed
pub fn find_bibd(params: DesignParameters, config: &SearchConfig) -> Result<Design, BibdError> {
    find_bibd_with_progress(params, config, |_, _| {})
}

/// Same as [`find_bibd`], with `on_update(iterations, depth)` called every
/// `config.report_every` search iterations.
pub fn find_bibd_with_progress<F>(
    params: DesignParameters,
    config: &SearchConfig,
    on_update: F,
) -> Result<Design, BibdError>
where
    F: FnMut(usize, usize),
{
    let derived = params.validate()?;
    debug!(b = derived.b, r = derived.r, "parameters validated");

    let DesignParameters { v, k, .. } = params;
    let limit = config.max_candidates;
    match candidates::binomial(v, k) {
        Some(count) if count <= limit => debug!(count, "generating candidate blocks"),
        _ => return Err(BibdError::CandidateLimitExceeded { v, k, limit }),
    }
    let candidates = generate_candidates(v, k);

    let outcome = search_with_progress(&params, &derived, &candidates, config, on_update)?;
    info!(
        v,
        k,
        lambda = params.lambda,
        b = derived.b,
        r = derived.r,
        iterations = outcome.iterations,
        "found balanced incomplete block design"
    );

    let design = Design::new(params, derived, outcome);
    debug_assert!(design.verify());
    Ok(design)
}
