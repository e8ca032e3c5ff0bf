//! Text codec for the libsvm sparse format: one row per line, `label idx:val idx:val ...`.
//!
//! Indices are 1-based on disk and 0-based in memory. Blank lines and `#` comments are skipped.
//! A line may carry no features at all; a line starting directly with a feature is read with label 0.

use crate::error::{KMeansError, Result};
use crate::memory::*;
use crate::sparse::matrix::SparseMatrix;
use std::{fmt::Write as _, fs, io::Write as _, path::Path};

impl<T: Primitive> SparseMatrix<T> {
    /// Parse a whole libsvm document. Fails on the first malformed line, reporting its 1-based number.
    pub fn parse_libsvm(text: &str) -> Result<Self> {
        let mut mtrx = SparseMatrix::new();
        let (mut indices, mut values) = (Vec::new(), Vec::new());
        for (line_idx, line) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            indices.clear();
            values.clear();
            let mut tokens = content.split_whitespace().peekable();
            let label = match tokens.peek() {
                Some(tok) if !tok.contains(':') => {
                    let label = parse_label(tok).ok_or_else(|| KMeansError::parse(line_no, format!("invalid label '{}'", tok)))?;
                    tokens.next();
                    label
                },
                _ => 0,
            };
            for tok in tokens {
                let (idx, val) = tok.split_once(':')
                    .ok_or_else(|| KMeansError::parse(line_no, format!("expected index:value, found '{}'", tok)))?;
                let idx: u32 = idx.parse()
                    .map_err(|_| KMeansError::parse(line_no, format!("invalid index '{}'", idx)))?;
                if idx == 0 {
                    return Err(KMeansError::parse(line_no, "indices are 1-based, found index 0"));
                }
                let val: T = match val.parse::<T>() {
                    Ok(v) if v.is_finite() => v,
                    _ => return Err(KMeansError::parse(line_no, format!("invalid value '{}'", val))),
                };
                let idx = idx - 1;
                if let Some(&prev) = indices.last() {
                    if idx <= prev {
                        return Err(KMeansError::parse(line_no, format!(
                            "index {} does not increase over preceding index {}", idx + 1, prev + 1)));
                    }
                }
                indices.push(idx);
                values.push(val);
            }
            mtrx.push_row_unchecked(label, &indices, &values);
        }
        Ok(mtrx)
    }

    pub fn load_libsvm<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_libsvm(&text)
    }

    /// Render the matrix as libsvm text; values use their shortest round-trip representation.
    pub fn to_libsvm_string(&self) -> String {
        let mut out = String::with_capacity(self.nnz() * 12 + self.no_rows() * 4);
        for (r, row) in self.rows().enumerate() {
            // writing into a String cannot fail
            let _ = write!(out, "{}", self.label(r));
            for (i, v) in row.iter() {
                let _ = write!(out, " {}:{}", i + 1, v);
            }
            out.push('\n');
        }
        out
    }

    pub fn store_libsvm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::io::BufWriter::new(fs::File::create(path)?);
        file.write_all(self.to_libsvm_string().as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn parse_label(tok: &str) -> Option<i64> {
    if let Ok(label) = tok.parse::<i64>() {
        return Some(label);
    }
    match tok.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_labels() {
        let text = "1 1:0.5 3:2\n\n# comment line\n-1\n+2 2:1e-3 10:-4 # trailing comment\n3:7\n";
        let mtrx = SparseMatrix::<f64>::parse_libsvm(text).unwrap();
        assert_eq!(mtrx.no_rows(), 4);
        assert_eq!(mtrx.dim(), 10);
        assert_eq!(mtrx.labels(), &[1, -1, 2, 0]);
        assert_eq!(mtrx.row(0).indices(), &[0, 2]);
        assert_eq!(mtrx.row(0).values(), &[0.5, 2.0]);
        assert_eq!(mtrx.row(1).nnz(), 0);
        assert_eq!(mtrx.row(2).values(), &[1e-3, -4.0]);
        assert_eq!(mtrx.row(3).indices(), &[2]);
    }

    #[test]
    fn float_labels_must_be_integral() {
        let mtrx = SparseMatrix::<f32>::parse_libsvm("2.0 1:1\n").unwrap();
        assert_eq!(mtrx.labels(), &[2]);
        assert!(SparseMatrix::<f32>::parse_libsvm("2.5 1:1\n").is_err());
    }

    fn parse_error_line(text: &str) -> usize {
        match SparseMatrix::<f64>::parse_libsvm(text) {
            Err(KMeansError::Parse { line, .. }) => line,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn reports_offending_line() {
        assert_eq!(parse_error_line("1 1:1\n1 2:x\n"), 2);
        assert_eq!(parse_error_line("1 1:1\n\n1 a:1\n"), 3);
        assert_eq!(parse_error_line("1 4:1 2:1\n"), 1);
        assert_eq!(parse_error_line("1 1:1\n1 2:1 2:3\n"), 2);
        assert_eq!(parse_error_line("1 0:1\n"), 1);
        assert_eq!(parse_error_line("1 1:1 7\n"), 1);
        assert_eq!(parse_error_line("abc 1:1\n"), 1);
        assert_eq!(parse_error_line("0 1:1\n0 1:NaN\n0 2:5\n"), 2);
        assert_eq!(parse_error_line("0 1:inf\n"), 1);
        assert_eq!(parse_error_line("0 1:1\n\n0 3:-infinity\n"), 3);
    }

    #[test]
    fn store_then_load() {
        let text = "1 1:0.5 3:2\n-1\n0 2:0.1 10:-4\n";
        let mtrx = SparseMatrix::<f64>::parse_libsvm(text).unwrap();
        assert_eq!(mtrx.to_libsvm_string(), text);

        let path = std::env::temp_dir().join(format!("sparse_kmeans_libsvm_{}.txt", std::process::id()));
        mtrx.store_libsvm(&path).unwrap();
        let loaded = SparseMatrix::<f64>::load_libsvm(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, mtrx);
    }
}
