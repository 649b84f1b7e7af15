use crate::error::{BibdError, Infeasibility, Result};

/// User-supplied design parameters.
///
/// * `v` - Number of treatments
/// * `k` - Number of treatments per block
/// * `lambda` - Number of blocks every pair of treatments must share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignParameters {
    pub v: usize,
    pub k: usize,
    pub lambda: usize,
}

/// Block count `b` and replication `r` implied by a feasible `(v, k, λ)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedParameters {
    pub b: usize,
    pub r: usize,
}

impl DesignParameters {
    pub fn new(v: usize, k: usize, lambda: usize) -> Self {
        Self { v, k, lambda }
    }

    /// Checks the integrality conditions and returns `(b, r)`.
    ///
    /// # Errors
    ///
    /// Returns `BibdError::InfeasibleParameters` when `k` is outside `2..=v`,
    /// `λ` is zero, either of `b` or `r` is fractional, or `b·k ≠ v·r`.
    pub fn validate(&self) -> Result<DerivedParameters> {
        let DesignParameters { v, k, lambda } = *self;
        let infeasible = |reason| BibdError::InfeasibleParameters { v, k, lambda, reason };

        if k < 2 || k > v {
            return Err(infeasible(Infeasibility::BlockSizeOutOfRange));
        }
        if lambda == 0 {
            return Err(infeasible(Infeasibility::ZeroLambda));
        }

        let num = lambda
            .checked_mul(v)
            .and_then(|x| x.checked_mul(v - 1))
            .ok_or_else(|| infeasible(Infeasibility::Overflow))?;
        let den = k * (k - 1);
        if num % den != 0 {
            return Err(infeasible(Infeasibility::NonIntegerBlockCount));
        }
        let b = num / den;

        let r_num = lambda
            .checked_mul(v - 1)
            .ok_or_else(|| infeasible(Infeasibility::Overflow))?;
        if r_num % (k - 1) != 0 {
            return Err(infeasible(Infeasibility::NonIntegerReplication));
        }
        let r = r_num / (k - 1);

        match (b.checked_mul(k), v.checked_mul(r)) {
            (Some(bk), Some(vr)) if bk == vr => Ok(DerivedParameters { b, r }),
            (Some(_), Some(_)) => Err(infeasible(Infeasibility::BalanceIdentity)),
            _ => Err(infeasible(Infeasibility::Overflow)),
        }
    }
}

/// Convenience wrapper over [`DesignParameters::validate`].
pub fn validate(v: usize, k: usize, lambda: usize) -> Result<DerivedParameters> {
    DesignParameters::new(v, k, lambda).validate()
}
