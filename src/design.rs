use nalgebra::DMatrix;

use crate::block_array::BlockArray;
use crate::candidates::Block;
use crate::coincidence_matrix::CoincidenceMatrix;
use crate::error::Result;
use crate::params::{DerivedParameters, DesignParameters};
use crate::search::SearchOutcome;
use crate::table::DesignTable;

/// A balanced incomplete block design produced by a successful search.
///
/// Blocks keep the order the search selected them in, which is the
/// lexicographic candidate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Design {
    parameters: DesignParameters,
    derived: DerivedParameters,
    blocks: Vec<Block>,
    iterations: usize,
}

impl Design {
    pub(crate) fn new(
        parameters: DesignParameters,
        derived: DerivedParameters,
        outcome: SearchOutcome,
    ) -> Self {
        Self {
            parameters,
            derived,
            blocks: outcome.blocks,
            iterations: outcome.iterations,
        }
    }

    pub fn parameters(&self) -> &DesignParameters {
        &self.parameters
    }

    pub fn derived(&self) -> &DerivedParameters {
        &self.derived
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Search frames entered before the design was found.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn block_array(&self) -> BlockArray {
        BlockArray::from_blocks(&self.blocks)
    }

    pub fn coincidence(&self) -> CoincidenceMatrix {
        CoincidenceMatrix::from_rows(self.parameters.v, self.blocks.iter())
    }

    /// `v × b` 0/1 matrix, `N[(t, j)] = 1` when block `j` holds treatment `t`.
    pub fn incidence_matrix(&self) -> DMatrix<usize> {
        let mut incidence = DMatrix::zeros(self.parameters.v, self.blocks.len());
        for (j, block) in self.blocks.iter().enumerate() {
            for &t in block.treatments() {
                incidence[(t, j)] += 1;
            }
        }
        incidence
    }

    /// `N Nᵀ`; equals `(r - λ) I + λ J` for a balanced design.
    pub fn concurrence_matrix(&self) -> DMatrix<usize> {
        let incidence = self.incidence_matrix();
        &incidence * incidence.transpose()
    }

    /// Treatment information matrix after eliminating blocks, `C = r I - N Nᵀ / k`.
    pub fn information_matrix(&self) -> DMatrix<f64> {
        let v = self.parameters.v;
        let r = self.derived.r as f64;
        let k = self.parameters.k as f64;
        DMatrix::<f64>::identity(v, v) * r - self.concurrence_matrix().cast::<f64>() / k
    }

    /// Efficiency relative to a complete block design, `E = λ v / (r k)`.
    pub fn efficiency_factor(&self) -> f64 {
        let DesignParameters { v, k, lambda } = self.parameters;
        (lambda * v) as f64 / (self.derived.r * k) as f64
    }

    /// Re-checks block count, block size, replication and co-occurrence.
    pub fn verify(&self) -> bool {
        let DesignParameters { v, k, lambda } = self.parameters;
        let DerivedParameters { b, r } = self.derived;

        if self.blocks.len() != b || self.blocks.iter().any(|block| block.len() != k) {
            return false;
        }
        if self.blocks.iter().flat_map(|block| block.treatments()).any(|&t| t >= v) {
            return false;
        }

        let coincidence = self.coincidence();
        (0..v).all(|t| coincidence.replication(t) == r)
            && (0..v).all(|i| ((i + 1)..v).all(|j| coincidence.co_occurrence(i, j) == lambda))
    }

    /// Labelled table, one row per block membership.
    pub fn to_table(&self, labels: Option<&[String]>) -> Result<DesignTable> {
        DesignTable::from_rows(self.blocks.iter(), labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{find_bibd, SearchConfig};

    fn fano() -> Design {
        find_bibd(DesignParameters::new(7, 3, 1), &SearchConfig::default()).unwrap()
    }

    #[test]
    fn test_verify_found_designs() {
        assert!(fano().verify());
        let design = find_bibd(DesignParameters::new(5, 3, 3), &SearchConfig::default()).unwrap();
        assert!(design.verify());
        assert!(design.coincidence().is_bibd());
    }

    #[test]
    fn test_verify_rejects_tampered_blocks() {
        let mut design = fano();
        design.blocks[6] = Block::new(vec![2, 4, 6]);
        assert!(!design.verify());

        let mut short = fano();
        short.blocks.pop();
        assert!(!short.verify());
    }

    #[test]
    fn test_incidence_matrix() {
        let design = fano();
        let incidence = design.incidence_matrix();
        assert_eq!(incidence.nrows(), 7);
        assert_eq!(incidence.ncols(), 7);
        assert_eq!(
            incidence.column(0).iter().copied().collect::<Vec<_>>(),
            vec![1, 1, 1, 0, 0, 0, 0]
        );
        assert!(incidence.row_iter().all(|row| row.sum() == 3));
    }

    #[test]
    fn test_concurrence_matches_coincidence() {
        let design = fano();
        let concurrence = design.concurrence_matrix();
        assert_eq!(concurrence, design.coincidence().coincidence);
        assert_eq!(
            CoincidenceMatrix::from_block_array(7, &design.block_array()),
            design.coincidence()
        );

        // (r - λ) I + λ J with r = 3, λ = 1
        let expected = DMatrix::from_fn(7, 7, |i, j| if i == j { 3 } else { 1 });
        assert_eq!(concurrence, expected);
    }

    #[test]
    fn test_information_matrix() {
        let c = fano().information_matrix();
        // λ/k (v I - J): diagonal 6/3, off-diagonal -1/3
        assert!((c[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((c[(0, 1)] + 1.0 / 3.0).abs() < 1e-12);
        assert!(c.row_iter().all(|row| row.sum().abs() < 1e-12));
    }

    #[test]
    fn test_efficiency_factor() {
        assert!((fano().efficiency_factor() - 7.0 / 9.0).abs() < 1e-12);
    }
}
