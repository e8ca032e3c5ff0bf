use crate::error::{KMeansError, Result};
use crate::memory::*;
use crate::sparse::vector::{check_indices, check_values, SparseRow, SparseVector};

/// Row-compressed sparse matrix. Row order is sample order.
///
/// Every row carries an integer label; clustering ignores it, but it survives
/// loading and storing.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix<T> {
    pointers: Vec<usize>,
    indices: Vec<u32>,
    values: Vec<T>,
    labels: Vec<i64>,
    dim: usize,
}

impl<T: Primitive> Default for SparseMatrix<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Primitive> SparseMatrix<T> {
    pub fn new() -> Self {
        Self { pointers: vec![0], indices: Vec::new(), values: Vec::new(), labels: Vec::new(), dim: 0 }
    }

    /// Append one row. Indices must be strictly increasing, values finite.
    pub fn push_row(&mut self, label: i64, indices: &[u32], values: &[T]) -> Result<()> {
        if indices.len() != values.len() {
            return Err(KMeansError::InvalidVector(format!(
                "{} indices but {} values", indices.len(), values.len())));
        }
        check_indices(indices).map_err(KMeansError::InvalidVector)?;
        check_values(values).map_err(KMeansError::InvalidVector)?;
        self.push_row_unchecked(label, indices, values);
        Ok(())
    }

    pub(crate) fn push_row_unchecked(&mut self, label: i64, indices: &[u32], values: &[T]) {
        if let Some(&last) = indices.last() {
            self.dim = self.dim.max(last as usize + 1);
        }
        self.indices.extend_from_slice(indices);
        self.values.extend_from_slice(values);
        self.pointers.push(self.indices.len());
        self.labels.push(label);
    }

    /// Build a matrix from a list of sparse vectors (the "vector list" form), labelled 0.
    pub fn from_vector_list(rows: &[SparseVector<T>]) -> Self {
        let mut mtrx = Self::new();
        rows.iter().for_each(|r| mtrx.push_row_unchecked(0, r.indices(), r.values()));
        mtrx
    }

    /// Split the matrix into one owned vector per row.
    pub fn to_vector_list(&self) -> Vec<SparseVector<T>> {
        self.rows().map(|r| r.to_owned()).collect()
    }

    /// Build from row-major dense data. Zeros are not stored.
    pub fn from_dense(samples: &[T], sample_cnt: usize, sample_dims: usize) -> Result<Self> {
        if samples.len() != sample_cnt * sample_dims {
            return Err(KMeansError::DimensionMismatch {
                row: sample_cnt, len: samples.len(), expected: sample_cnt * sample_dims });
        }
        let mut mtrx = Self::new();
        if sample_dims > 0 {
            for (r, row) in samples.chunks_exact(sample_dims).enumerate() {
                check_values(row).map_err(|e| KMeansError::InvalidVector(format!("row {}: {}", r, e)))?;
                let v = SparseVector::from_dense(row);
                mtrx.push_row_unchecked(0, v.indices(), v.values());
            }
        } else {
            (0..sample_cnt).for_each(|_| mtrx.push_row_unchecked(0, &[], &[]));
        }
        mtrx.dim = sample_dims;
        Ok(mtrx)
    }

    /// Build from dense rows that must all share one length.
    pub fn from_dense_rows(rows: &[Vec<T>]) -> Result<Self> {
        let sample_dims = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != sample_dims) {
            return Err(KMeansError::DimensionMismatch { row, len: r.len(), expected: sample_dims });
        }
        let flat: Vec<T> = rows.iter().flat_map(|r| r.iter().cloned()).collect();
        Self::from_dense(&flat, rows.len(), sample_dims)
    }

    /// Row-major dense copy with `no_rows() * dim()` entries.
    pub fn to_dense(&self) -> Vec<T> {
        let mut dense = vec![T::zero(); self.no_rows() * self.dim];
        dense.chunks_exact_mut(self.dim.max(1)).zip(self.rows())
            .for_each(|(d, r)| r.iter().for_each(|(i, v)| d[i] = v));
        dense
    }

    /// Widen the implicit dimension, e.g. to match the matrix a model was fitted on.
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = self.dim.max(dim);
        self
    }

    pub fn with_labels(mut self, labels: Vec<i64>) -> Result<Self> {
        if labels.len() != self.no_rows() {
            return Err(KMeansError::DimensionMismatch { row: 0, len: labels.len(), expected: self.no_rows() });
        }
        self.labels = labels;
        Ok(self)
    }

    /// Copy of the selected rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut mtrx = Self::new();
        for &r in rows {
            let row = self.row(r);
            mtrx.push_row_unchecked(self.labels[r], row.indices(), row.values());
        }
        mtrx.dim = self.dim;
        mtrx
    }

    pub fn row(&self, idx: usize) -> SparseRow<'_, T> {
        let (start, end) = (self.pointers[idx], self.pointers[idx + 1]);
        SparseRow::new_unchecked(&self.indices[start..end], &self.values[start..end])
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = SparseRow<'_, T>> + '_ {
        (0..self.no_rows()).map(move |i| self.row(i))
    }

    pub fn no_rows(&self) -> usize { self.pointers.len() - 1 }
    pub fn is_empty(&self) -> bool { self.no_rows() == 0 }
    pub fn dim(&self) -> usize { self.dim }
    pub fn nnz(&self) -> usize { self.indices.len() }
    pub fn labels(&self) -> &[i64] { &self.labels }
    pub fn label(&self, idx: usize) -> i64 { self.labels[idx] }

    /// Average number of stored values per row (integer division, as recorded in run metrics).
    pub fn average_nnz(&self) -> usize {
        if self.is_empty() { 0 } else { self.nnz() / self.no_rows() }
    }

    pub fn squared_norms(&self) -> Vec<T> {
        self.rows().map(|r| r.squared_norm()).collect()
    }

    /// Fails on the first row holding a non-finite value or a squared norm that overflows `T`.
    pub(crate) fn check_finite(&self) -> Result<()> {
        for (r, row) in self.rows().enumerate() {
            check_values(row.values()).map_err(|e| KMeansError::InvalidVector(format!("row {}: {}", r, e)))?;
            if !row.squared_norm().is_finite() {
                return Err(KMeansError::InvalidVector(format!("row {}: squared norm overflows", r)));
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test] fn dense_round_trip_f32() { dense_round_trip::<f32>(); }
    #[test] fn dense_round_trip_f64() { dense_round_trip::<f64>(); }

    fn dense_round_trip<T: Primitive>() {
        let dense: Vec<T> = [0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 3.5, 0.0, -1.0]
            .iter().map(|&v| T::from_f64_lossy(v)).collect();
        let mtrx = SparseMatrix::from_dense(&dense, 3, 3).unwrap();
        assert_eq!(mtrx.no_rows(), 3);
        assert_eq!(mtrx.dim(), 3);
        assert_eq!(mtrx.nnz(), 4);
        assert_eq!(mtrx.average_nnz(), 1);
        assert_eq!(mtrx.row(1).indices(), &[0]);
        assert_eq!(mtrx.row(2).indices(), &[0, 2]);
        assert_eq!(mtrx.to_dense(), dense);
    }

    #[test]
    fn dense_rows_must_agree() {
        let rows = vec![vec![1.0f64, 2.0], vec![3.0]];
        match SparseMatrix::from_dense_rows(&rows) {
            Err(KMeansError::DimensionMismatch { row, len, expected }) => assert_eq!((row, len, expected), (1, 1, 2)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(SparseMatrix::<f64>::from_dense(&[1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut mtrx = SparseMatrix::<f32>::new();
        assert!(matches!(mtrx.push_row(0, &[1], &[f32::NAN]), Err(KMeansError::InvalidVector(_))));
        assert!(matches!(mtrx.push_row(0, &[0, 4], &[1.0, f32::INFINITY]), Err(KMeansError::InvalidVector(_))));
        assert!(mtrx.is_empty());
        match SparseMatrix::<f64>::from_dense(&[1.0, 0.0, f64::NEG_INFINITY, 2.0], 2, 2) {
            Err(KMeansError::InvalidVector(message)) => assert!(message.starts_with("row 1")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(SparseVector::new(vec![2], vec![f64::NAN]).is_err());

        let unchecked = SparseMatrix::from_vector_list(&[
            SparseVector::from_dense(&[1.0f32, 0.0]),
            SparseVector::from_dense(&[0.0, f32::NAN]),
        ]);
        assert!(unchecked.check_finite().unwrap_err().to_string().contains("row 1"));
        let overflowing = SparseMatrix::from_dense(&[3e20f32, 1.0], 1, 2).unwrap();
        assert!(overflowing.check_finite().is_err());
        assert!(SparseMatrix::from_dense(&[3e10f32, 1.0], 1, 2).unwrap().check_finite().is_ok());
    }

    #[test]
    fn vector_list_round_trip() {
        let rows = vec![
            SparseVector::new(vec![0, 4], vec![1.0f64, 2.0]).unwrap(),
            SparseVector::default(),
            SparseVector::new(vec![7], vec![-3.0]).unwrap(),
        ];
        let mtrx = SparseMatrix::from_vector_list(&rows);
        assert_eq!(mtrx.dim(), 8);
        assert_eq!(mtrx.no_rows(), 3);
        assert_eq!(mtrx.to_vector_list(), rows);

        let picked = mtrx.select_rows(&[2, 0]);
        assert_eq!(picked.no_rows(), 2);
        assert_eq!(picked.row(0).values(), &[-3.0]);
        assert_eq!(picked.dim(), 8);
    }

    #[test]
    fn push_row_validates() {
        let mut mtrx = SparseMatrix::<f64>::new();
        assert!(mtrx.push_row(1, &[3, 2], &[1.0, 1.0]).is_err());
        assert!(mtrx.push_row(1, &[2, 3], &[1.0]).is_err());
        mtrx.push_row(-1, &[2, 3], &[1.0, 2.0]).unwrap();
        assert_eq!(mtrx.no_rows(), 1);
        assert_eq!(mtrx.labels(), &[-1]);
        assert_eq!(mtrx.squared_norms(), vec![5.0]);
        assert_eq!(mtrx.clone().with_dim(10).dim(), 10);
        assert!(mtrx.with_labels(vec![1, 2]).is_err());
    }
}
