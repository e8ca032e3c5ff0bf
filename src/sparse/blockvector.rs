use crate::helpers;
use crate::memory::*;
use crate::sparse::{SparseMatrix, SparseRow, SparseVector};

/// Partition of the column space into equally sized blocks of consecutive keys.
///
/// The block vector of `v` holds, for every block touched by `v`, the norm of `v` restricted to
/// that block. For any two vectors `<bv(a), bv(b)> >= <a, b>` (Cauchy-Schwarz per block), so
/// `|a|^2 + |b|^2 - 2 <bv(a), bv(b)>` never exceeds the squared distance of `a` and `b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BlockLayout {
    pub keys_per_block: usize,
    pub no_blocks: usize,
}

/// Outcome of the block count search, as recorded in the run metrics.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockSearch {
    pub layout: BlockLayout,
    pub annz: usize,
    pub annz_samples: usize,
}

impl BlockLayout {
    pub fn with_blocks(dim: usize, no_blocks: usize) -> Self {
        let no_blocks = no_blocks.clamp(1, dim.max(1));
        let keys_per_block = helpers::div_roundup(dim.max(1), no_blocks).max(1);
        Self { keys_per_block, no_blocks }
    }

    /// Shrink the number of blocks until the average block vector holds at most
    /// `desired_annz` times the average number of sample non-zeros.
    pub fn search<T: Primitive>(samples: &SparseMatrix<T>, desired_annz: f64) -> BlockSearch {
        let dim = samples.dim();
        let annz_samples = samples.average_nnz();
        let mut no_blocks = ((dim as f64 * desired_annz * 1.33334) as usize).clamp(1, dim.max(1));
        loop {
            let layout = Self::with_blocks(dim, no_blocks);
            let annz = layout.average_nnz(samples);
            if (annz as f64) <= desired_annz * annz_samples as f64 || no_blocks <= 1 {
                return BlockSearch { layout, annz, annz_samples };
            }
            no_blocks = ((no_blocks as f64 * 0.7) as usize).max(1);
        }
    }

    #[inline(always)]
    pub fn block_of(&self, key: usize) -> usize { key / self.keys_per_block }

    pub fn average_nnz<T: Primitive>(&self, samples: &SparseMatrix<T>) -> usize {
        if samples.is_empty() {
            return 0;
        }
        let total: usize = samples.rows().map(|r| self.count_blocks(r)).sum();
        total / samples.no_rows()
    }

    fn count_blocks<T: Primitive>(&self, row: SparseRow<'_, T>) -> usize {
        let mut last = usize::MAX;
        row.indices().iter().filter(|&&i| {
            let b = self.block_of(i as usize);
            let new = b != last;
            last = b;
            new
        }).count()
    }

    pub fn block_vector<T: Primitive>(&self, row: SparseRow<'_, T>) -> SparseVector<T> {
        let mut indices: Vec<u32> = Vec::with_capacity(self.count_blocks(row));
        let mut values: Vec<T> = Vec::with_capacity(indices.capacity());
        for (i, v) in row.iter() {
            let b = self.block_of(i) as u32;
            if indices.last() == Some(&b) {
                if let Some(last) = values.last_mut() {
                    *last += v * v;
                }
            } else {
                indices.push(b);
                values.push(v * v);
            }
        }
        values.iter_mut().for_each(|v| *v = v.sqrt());
        SparseVector::from_parts_unchecked(indices, values)
    }

    pub fn block_vector_dense<T: Primitive>(&self, dense: &[T]) -> SparseVector<T> {
        let (indices, values) = dense.chunks(self.keys_per_block).enumerate()
            .map(|(b, chunk)| (b as u32, chunk.iter().map(|&v| v * v).sum::<T>()))
            .filter(|(_, sq)| !sq.is_zero())
            .map(|(b, sq)| (b, sq.sqrt()))
            .unzip();
        SparseVector::from_parts_unchecked(indices, values)
    }
}

/// Lower bound of the squared distance from the norms and block vectors of both operands.
#[inline]
pub(crate) fn block_vector_bound<T: Primitive>(sq_norm_a: T, bv_a: SparseRow<'_, T>, sq_norm_b: T, bv_b: SparseRow<'_, T>) -> T {
    let two = T::one() + T::one();
    (sq_norm_a + sq_norm_b - two * bv_a.dot(bv_b)).max(T::zero())
}
