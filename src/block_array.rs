use nalgebra::DMatrix;

use crate::candidates::Block;
use crate::random_type::{permute_b, RandomType};

/// Represents a block array, which is a matrix where each row is a block and
/// each column a position within the block.
///
/// # Fields
///
/// * `block_array` - `b × k` matrix of treatment indices
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BlockArray {
    pub block_array: DMatrix<usize>,
}

impl BlockArray {
    pub fn from_block_array(block_array: &DMatrix<usize>) -> Self {
        Self { block_array: block_array.clone() }
    }

    /// Lays equal-sized blocks out row by row.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let k = blocks.first().map_or(0, Block::len);
        debug_assert!(blocks.iter().all(|b| b.len() == k));
        let block_array = DMatrix::from_fn(blocks.len(), k, |i, j| blocks[i].treatments()[j]);
        Self { block_array }
    }

    pub fn nblocks(&self) -> usize {
        self.block_array.nrows()
    }

    pub fn block_size(&self) -> usize {
        self.block_array.ncols()
    }

    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        self.block_array
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    /// Each row ascending, then rows in lexicographic order.
    pub fn as_sorted(&self) -> DMatrix<usize> {
        let mut rows = self.to_rows();
        for row in rows.iter_mut() {
            row.sort_unstable();
        }
        rows.sort();
        DMatrix::from_fn(self.nblocks(), self.block_size(), |i, j| rows[i][j])
    }

    /// Serving order for a tasting panel: blocks are dealt to sessions in a
    /// random order and each session tastes its treatments in a random order.
    pub fn randomized(&self, random_type: RandomType) -> BlockArray {
        let rows = self.to_rows();

        let mut order: Vec<usize> = (0..rows.len()).collect();
        permute_b(&mut order, random_type);

        let shuffled: Vec<Vec<usize>> = order
            .iter()
            .map(|&i| {
                let mut row = rows[i].clone();
                permute_b(&mut row, random_type);
                row
            })
            .collect();

        let block_array =
            DMatrix::from_fn(self.nblocks(), self.block_size(), |i, j| shuffled[i][j]);
        BlockArray { block_array }
    }
}
