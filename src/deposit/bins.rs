//! Counting-sort binner for the host tiled path.
//!
//! One parallel pass computes a bin for every item, then a histogram,
//! exclusive prefix sum and stable scatter produce a permutation grouped by
//! bin plus `[start, end)` offsets per bin. O(n + bins), no comparisons.

use rayon::prelude::*;

/// Items below this count are keyed serially.
const PARALLEL_KEY_THRESHOLD: usize = 4_096;

#[derive(Clone, Debug, Default)]
pub struct DenseBins {
    permutation: Vec<u32>,
    offsets: Vec<u32>,
}

impl DenseBins {
    /// Bin `num_items` items into `num_bins` buckets using `key`.
    ///
    /// `key` must return a value in `0..num_bins`. Items keep their relative
    /// order inside a bin.
    pub fn build<K>(num_items: usize, num_bins: usize, key: K) -> Self
    where
        K: Fn(usize) -> usize + Sync,
    {
        assert!(num_items <= u32::MAX as usize, "too many items to bin: {num_items}");
        assert!(num_bins > 0, "need at least one bin");

        let keys: Vec<u32> = if num_items >= PARALLEL_KEY_THRESHOLD {
            (0..num_items).into_par_iter().map(|i| key(i) as u32).collect()
        } else {
            (0..num_items).map(|i| key(i) as u32).collect()
        };

        let mut offsets = vec![0u32; num_bins + 1];
        for &k in &keys {
            debug_assert!((k as usize) < num_bins, "bin {k} out of range ({num_bins})");
            offsets[k as usize + 1] += 1;
        }
        for b in 0..num_bins {
            offsets[b + 1] += offsets[b];
        }

        let mut cursor = offsets[..num_bins].to_vec();
        let mut permutation = vec![0u32; num_items];
        for (i, &k) in keys.iter().enumerate() {
            let slot = &mut cursor[k as usize];
            permutation[*slot as usize] = i as u32;
            *slot += 1;
        }

        Self { permutation, offsets }
    }

    #[cfg(test)]
    pub fn num_bins(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    #[cfg(test)]
    pub fn num_items(&self) -> usize {
        self.permutation.len()
    }

    #[inline]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Items assigned to `bin`, in input order.
    #[inline]
    pub fn bin(&self, bin: usize) -> &[u32] {
        let start = self.offsets[bin] as usize;
        let end = self.offsets[bin + 1] as usize;
        &self.permutation[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::DenseBins;
    use rand::{Rng, SeedableRng};

    #[test]
    fn bins_are_stable_and_complete() {
        let keys = [2usize, 0, 2, 1, 0, 3, 2];
        let bins = DenseBins::build(keys.len(), 4, |i| keys[i]);
        assert_eq!(bins.offsets(), &[0, 2, 3, 6, 7]);
        assert_eq!(bins.bin(0), &[1, 4]);
        assert_eq!(bins.bin(1), &[3]);
        assert_eq!(bins.bin(2), &[0, 2, 6]);
        assert_eq!(bins.bin(3), &[5]);
    }

    #[test]
    fn empty_bins_have_empty_ranges() {
        let bins = DenseBins::build(3, 5, |_| 4);
        for b in 0..4 {
            assert!(bins.bin(b).is_empty());
        }
        assert_eq!(bins.bin(4), &[0, 1, 2]);

        let none = DenseBins::build(0, 2, |_| 0);
        assert_eq!(none.offsets(), &[0, 0, 0]);
    }

    #[test]
    fn parallel_keying_matches_serial_layout() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xB1_75);
        let keys: Vec<usize> = (0..20_000).map(|_| rng.random_range(0..37)).collect();
        let bins = DenseBins::build(keys.len(), 37, |i| keys[i]);

        let mut expected: Vec<Vec<u32>> = vec![Vec::new(); 37];
        for (i, &k) in keys.iter().enumerate() {
            expected[k].push(i as u32);
        }
        for (b, items) in expected.iter().enumerate() {
            assert_eq!(bins.bin(b), items.as_slice(), "bin {b}");
        }
        assert_eq!(bins.num_items(), keys.len());
        assert_eq!(bins.num_bins(), 37);
    }
}
