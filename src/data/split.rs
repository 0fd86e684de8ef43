//! Deterministic train/test partitioning.
//!
//! Rows are shuffled with a seeded `StdRng`; the first `ceil(test_size * n)`
//! shuffled rows form the test partition and the rest the training partition.
//! The same `(n, test_size, seed)` always yields the same partition.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::Table;
use crate::error::AppError;

/// Row indices of each partition, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct TrainTest {
    pub train: Table,
    pub test: Table,
}

pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<Split, AppError> {
    if !(test_size.is_finite() && test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::input(format!("test_size must be in (0, 1), got {test_size}.")));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(AppError::input(format!(
            "Cannot split {n} rows with test_size={test_size}: both partitions need at least one row."
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok(Split { train, test: order })
}

pub fn train_test_split(table: &Table, test_size: f64, seed: u64) -> Result<TrainTest, AppError> {
    let split = split_indices(table.n_rows(), test_size, seed)?;
    tracing::info!(
        train = split.train.len(),
        test = split.test.len(),
        seed,
        "split data"
    );
    Ok(TrainTest {
        train: table.select_rows(&split.train),
        test: table.select_rows(&split.test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sizes_follow_ceiling_rule() {
        let s = split_indices(1796, 0.25, 42).unwrap();
        assert_eq!(s.test.len(), 449);
        assert_eq!(s.train.len(), 1347);
    }

    #[test]
    fn partitions_are_disjoint_and_cover_all_rows() {
        let s = split_indices(101, 0.3, 7).unwrap();
        let train: HashSet<usize> = s.train.iter().copied().collect();
        let test: HashSet<usize> = s.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 101);
    }

    #[test]
    fn same_seed_same_partition() {
        let a = split_indices(500, 0.25, 42).unwrap();
        let b = split_indices(500, 0.25, 42).unwrap();
        let c = split_indices(500, 0.25, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn degenerate_splits_are_rejected() {
        assert!(split_indices(1, 0.25, 0).is_err());
        assert!(split_indices(10, 0.0, 0).is_err());
        assert!(split_indices(10, 1.0, 0).is_err());
    }
}
