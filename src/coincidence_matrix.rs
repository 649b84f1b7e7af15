use nalgebra::DMatrix;

use crate::block_array::BlockArray;

/// Treatment-by-treatment tally of a block design.
///
/// The diagonal counts how many blocks hold each treatment; off-diagonal cells
/// count how many blocks hold both treatments. The matrix is symmetric and
/// equals `N Nᵀ` for the incidence matrix `N`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CoincidenceMatrix {
    pub coincidence: DMatrix<usize>,
}

impl CoincidenceMatrix {
    /// Tallies `v` treatments over rows of treatment indices.
    pub fn from_rows<I, R>(v: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[usize]>,
    {
        let mut coincidence: DMatrix<usize> = DMatrix::zeros(v, v);
        for row in rows {
            let elements = row.as_ref();
            for (i, &elem_i) in elements.iter().enumerate() {
                coincidence[(elem_i, elem_i)] += 1;
                for &elem_j in &elements[i + 1..] {
                    coincidence[(elem_i, elem_j)] += 1;
                    coincidence[(elem_j, elem_i)] += 1;
                }
            }
        }
        Self { coincidence }
    }

    pub fn from_block_array(v: usize, block_array: &BlockArray) -> Self {
        Self::from_rows(v, block_array.to_rows())
    }

    pub fn v(&self) -> usize {
        self.coincidence.nrows()
    }

    pub fn replication(&self, treatment: usize) -> usize {
        self.coincidence[(treatment, treatment)]
    }

    pub fn co_occurrence(&self, a: usize, b: usize) -> usize {
        self.coincidence[(a, b)]
    }

    /// Mean replication.
    pub fn r(&self) -> f64 {
        self.coincidence.diagonal().cast::<f64>().mean()
    }

    /// Mean pairwise co-occurrence over the upper triangle.
    pub fn lambda(&self) -> f64 {
        let v = self.v();
        let cells = v * v.saturating_sub(1) / 2;
        if cells == 0 {
            return 0.0;
        }
        let total: usize = self.upper_cells().sum();
        total as f64 / cells as f64
    }

    /// Constant replication and constant co-occurrence.
    pub fn is_bibd(&self) -> bool {
        let diagonal = self.coincidence.diagonal();
        let constant_r = diagonal.iter().all(|&c| c == diagonal[0]);
        let mut upper = self.upper_cells();
        let constant_lambda = match upper.next() {
            Some(first) => upper.all(|c| c == first),
            None => true,
        };
        constant_r && constant_lambda
    }

    fn upper_cells(&self) -> impl Iterator<Item = usize> + '_ {
        let v = self.v();
        (0..v).flat_map(move |i| ((i + 1)..v).map(move |j| self.coincidence[(i, j)]))
    }
}
