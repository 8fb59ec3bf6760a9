//! Deterministic train/test split

use crate::error::{PlatformError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded generator and hold out `ceil(test_size * n_rows)`
/// rows for testing. The same `(n_rows, test_size, seed)` always yields the same split.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(PlatformError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n_rows as f64).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_train == 0 || n_test == 0 {
        return Err(PlatformError::EmptyDataset { rows: n_rows });
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}
