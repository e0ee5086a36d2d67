//! Seeded train/validation/test split and batched iteration

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::dataset::GraphDataset;
use super::graph::{GraphBatch, GraphEvent};

/// Event indices of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `0..len` into train/validation/test partitions
///
/// Validation and test each get `ceil(len * tv_frac)` events, train the rest.
/// All three are drawn from one permutation seeded with `seed`.
pub fn random_split(len: usize, tv_frac: f64, seed: u64) -> Result<Split> {
    let tv_num = (len as f64 * tv_frac).ceil() as usize;
    if 2 * tv_num > len {
        anyhow::bail!(
            "Cannot hold out 2 x {} events from a dataset of {}",
            tv_num,
            len
        );
    }

    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train_len = len - 2 * tv_num;
    let test = order.split_off(train_len + tv_num);
    let valid = order.split_off(train_len);

    Ok(Split {
        train: order,
        valid,
        test,
    })
}

/// Iterates a dataset partition in batches of events
pub struct DataLoader<'a> {
    dataset: &'a GraphDataset,
    indices: Vec<usize>,
    batch_size: usize,
    rng: Option<StdRng>,
}

impl<'a> DataLoader<'a> {
    /// Loader over `indices` in their given order
    pub fn new(dataset: &'a GraphDataset, indices: Vec<usize>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= dataset.len()) {
            anyhow::bail!("Index {} out of range for {} events", bad, dataset.len());
        }
        Ok(Self {
            dataset,
            indices,
            batch_size,
            rng: None,
        })
    }

    /// Reshuffle the partition at the start of every pass
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Number of events in the partition
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Batches per pass; the last one may be short
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One pass over the partition
    pub fn iter(&mut self) -> impl Iterator<Item = GraphBatch> + '_ {
        let mut order = self.indices.clone();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }

        let events = self.dataset.events();
        let batch_size = self.batch_size;
        (0..order.len()).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(order.len());
            let batch: Vec<&GraphEvent> = order[start..end].iter().map(|&i| &events[i]).collect();
            GraphBatch::collate(&batch)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> GraphDataset {
        GraphDataset::from_events(
            (0..n)
                .map(|i| GraphEvent::fully_connected(vec![i as f32; 8], 2).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_split_sizes() {
        let split = random_split(95, 0.10, 0).unwrap();
        // ceil(9.5) = 10
        assert_eq!(split.valid.len(), 10);
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.train.len(), 75);
    }

    #[test]
    fn test_split_is_partition() {
        let split = random_split(50, 0.10, 0).unwrap();
        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.valid)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_deterministic_per_seed() {
        assert_eq!(random_split(40, 0.1, 0).unwrap(), random_split(40, 0.1, 0).unwrap());
        assert_ne!(random_split(40, 0.1, 0).unwrap(), random_split(40, 0.1, 7).unwrap());
    }

    #[test]
    fn test_split_too_small() {
        assert!(random_split(1, 0.10, 0).is_err());
        assert!(random_split(0, 0.10, 0).unwrap().train.is_empty());
    }

    #[test]
    fn test_loader_batches_in_order() {
        let ds = dataset(10);
        let mut loader = DataLoader::new(&ds, vec![3, 1, 4, 5, 9], 2).unwrap();
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<GraphBatch> = loader.iter().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].num_graphs, 2);
        assert_eq!(batches[2].num_graphs, 1);
        assert_eq!(batches[0].x[0], 3.0);
        assert_eq!(batches[0].x[8], 1.0);
        assert_eq!(batches[2].x[0], 9.0);
    }

    #[test]
    fn test_shuffled_loader_covers_partition() {
        let ds = dataset(9);
        let mut loader = DataLoader::new(&ds, (0..9).collect(), 4).unwrap().shuffled(0);
        let mut firsts: Vec<f32> = loader
            .iter()
            .flat_map(|b| b.x.chunks(8).map(|c| c[0]).collect::<Vec<_>>())
            .collect();
        firsts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(firsts, (0..9).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_loader_rejects_bad_index() {
        let ds = dataset(2);
        assert!(DataLoader::new(&ds, vec![2], 1).is_err());
        assert!(DataLoader::new(&ds, vec![0], 0).is_err());
    }
}
