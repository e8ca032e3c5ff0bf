pub(crate) fn div_roundup(val: usize, divisor: usize) -> usize {
    if val % divisor != 0 {
        val / divisor + 1
    } else {
        val / divisor
    }
}

#[cfg(test)]
macro_rules! assert_approx_eq {
	($left: expr, $right: expr, $tol: expr) => ({
		match ($left, $right, $tol) {
			(left_val , right_val, tol_val) => {
				let delta = (left_val - right_val).abs();
				if !(delta < tol_val) {
					panic!(
						"assertion failed: `(left ≈ right)` \
						(left: `{}`, right: `{}`) \
						with ∆={:1.1e} (allowed ∆={:e})",
						left_val , right_val, delta, tol_val
					)
				}
			}
		}
	});
	($left: expr, $right: expr) => (assert_approx_eq!(($left), ($right), 1e-15))
}




#[cfg(test)]
mod tests {
	use super::testing;

	#[test]
    fn div_roundup() {
		for o in 1..20 {
			assert_eq!(super::div_roundup(0, o), 0);
			for i in 1..=o {
				assert_eq!(super::div_roundup(i, o), 1);
			}
			for i in o+1..=2*o {
				assert_eq!(super::div_roundup(i, o), 2);
			}
		}
    }

	#[test]
	fn fixtures_are_deterministic() {
		let a = testing::topic_samples::<f64>(7, 50, 300, 4, 12);
		let b = testing::topic_samples::<f64>(7, 50, 300, 4, 12);
		assert_eq!(a, b);
		assert_eq!(a.no_rows(), 50);
		assert_eq!(a.dim(), 300);
		assert!(a.rows().all(|r| r.nnz() > 0 && r.nnz() <= 12));
		assert_eq!(testing::four_points::<f32>().to_dense(), vec![0.0, 0.0, 0.0, 1.0, 10.0, 10.0, 10.0, 11.0]);
	}
}
