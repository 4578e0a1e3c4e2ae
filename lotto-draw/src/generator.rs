use crate::entropy::EntropySource;
use crate::error::Result;
use lotto_core::{LottoError, PoolShape};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Draws pools and winning subsets from an [`EntropySource`].
#[derive(Clone)]
pub struct NumberGenerator {
    entropy: Arc<dyn EntropySource>,
}

impl NumberGenerator {
    pub fn new(entropy: Arc<dyn EntropySource>) -> Self {
        Self { entropy }
    }

    /// The full drawn set for a pool: `total` unique values in `[1, total]`, ascending.
    pub async fn generate_numbers(&self, shape: &PoolShape) -> Result<Vec<u32>> {
        let total = shape.total();
        self.generate_unique(total, total).await
    }

    /// `count` unique values in `[1, pool_size]`, ascending.
    ///
    /// Parameters are checked before the first entropy request.
    pub async fn generate_unique(&self, count: u32, pool_size: u32) -> Result<Vec<u32>> {
        if count == 0 || pool_size == 0 {
            return Err(LottoError::invalid_parameters(
                "count and pool size must be greater than 0",
            )
            .into());
        }
        if count > pool_size {
            return Err(LottoError::invalid_parameters(format!(
                "cannot draw {} unique numbers from a pool of {}",
                count, pool_size
            ))
            .into());
        }

        let mut drawn = BTreeSet::new();
        while drawn.len() < count as usize {
            let n = self.entropy.next_int(1, pool_size).await?;
            drawn.insert(n);
        }

        Ok(drawn.into_iter().collect())
    }

    /// Uniform sample without replacement: Fisher-Yates over a copy, then truncate.
    pub async fn select_winners(&self, numbers: &[u32], count_fill_user: u32) -> Result<Vec<u32>> {
        let count = count_fill_user as usize;
        if count > numbers.len() {
            return Err(LottoError::invalid_parameters(format!(
                "count_fill_user {} exceeds drawn set of {}",
                count_fill_user,
                numbers.len()
            ))
            .into());
        }

        let mut shuffled = numbers.to_vec();
        for i in (1..shuffled.len()).rev() {
            let j = self.entropy.next_int(0, i as u32).await? as usize;
            shuffled.swap(i, j);
        }

        shuffled.truncate(count);
        Ok(shuffled)
    }
}
