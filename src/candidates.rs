/// An unordered set of treatment indices, stored ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(Vec<usize>);

impl Block {
    /// Builds a block from any treatment order; indices are sorted ascending.
    pub fn new(mut treatments: Vec<usize>) -> Self {
        treatments.sort_unstable();
        Self(treatments)
    }

    pub fn treatments(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, treatment: usize) -> bool {
        self.0.binary_search(&treatment).is_ok()
    }

    /// All `C(k,2)` pairs in the block, lexicographic.
    pub fn pairs(&self) -> Vec<Pair> {
        let mut pairs = Vec::with_capacity(self.0.len() * self.0.len().saturating_sub(1) / 2);
        for (i, &a) in self.0.iter().enumerate() {
            for &b in &self.0[i + 1..] {
                pairs.push(Pair::new(a, b));
            }
        }
        pairs
    }
}

impl AsRef<[usize]> for Block {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Block {
    fn from(treatments: Vec<usize>) -> Self {
        Block::new(treatments)
    }
}

/// Unordered pair of distinct treatments, normalised so that `lo() <= hi()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair(usize, usize);

impl Pair {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Pair(a, b)
        } else {
            Pair(b, a)
        }
    }

    /// The smaller treatment index.
    pub fn lo(&self) -> usize {
        self.0
    }

    pub fn hi(&self) -> usize {
        self.1
    }
}

/// Every size-`k` subset of `0..v` in lexicographic order, with its pairs precomputed.
///
/// The order matters: the search walks candidates front to back, so it decides
/// which design is returned when several exist.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    v: usize,
    k: usize,
    blocks: Vec<Block>,
    pairs: Vec<Vec<Pair>>,
}

impl CandidateSet {
    pub fn v(&self) -> usize {
        self.v
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, idx: usize) -> &Block {
        &self.blocks[idx]
    }

    pub fn pairs_of(&self, idx: usize) -> &[Pair] {
        &self.pairs[idx]
    }
}

/// `C(n, k)`, or `None` if it does not fit in a `usize`.
pub fn binomial(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by (i + 1) at every step
        acc = acc.checked_mul(n - i)? / (i + 1);
    }
    Some(acc)
}

/// Enumerates the candidate universe for a search.
///
/// Callers bound `v`: the result holds `C(v,k)` blocks.
pub fn generate_candidates(v: usize, k: usize) -> CandidateSet {
    let mut blocks = Vec::with_capacity(binomial(v, k).unwrap_or(0));

    if k <= v {
        let mut idx: Vec<usize> = (0..k).collect();
        loop {
            blocks.push(Block(idx.clone()));

            // rightmost position that can still advance
            let Some(pos) = (0..k).rev().find(|&i| idx[i] != i + v - k) else {
                break;
            };
            idx[pos] += 1;
            for j in pos + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
        }
    }

    let pairs = blocks.iter().map(Block::pairs).collect();
    CandidateSet { v, k, blocks, pairs }
}
