//! Membership index over content digests.
//!
//! A fixed-size bit array probed `k` times per key. Positions come from
//! double hashing (`h1 + i * h2`) over two FNV-derived base hashes, so a key
//! costs two passes over its bytes regardless of `k`.

use super::IndexError;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Probabilistic set of byte keys. Answers "definitely absent" or
/// "possibly present"; never produces a false negative.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    num_bits: u64,
    num_hashes: u32,
    insertions: u64,
}

impl BloomFilter {
    /// Allocate a filter of `num_bits` zeroed bits probed `num_hashes` times per key.
    pub fn new(num_bits: u64, num_hashes: u32) -> Result<Self, IndexError> {
        if num_bits == 0 {
            return Err(IndexError::InvalidSize("bit array must hold at least one bit"));
        }
        if num_hashes == 0 {
            return Err(IndexError::InvalidSize("at least one hash probe is required"));
        }

        let num_bytes = usize::try_from(num_bits.div_ceil(8))
            .map_err(|_| IndexError::ResourceExhausted)?;
        let mut bits = Vec::new();
        bits.try_reserve_exact(num_bytes)
            .map_err(|_| IndexError::ResourceExhausted)?;
        bits.resize(num_bytes, 0);

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            insertions: 0,
        })
    }

    /// Size a filter so that `expected_items` keys give roughly `false_positive_rate`.
    pub fn with_rate(expected_items: u64, false_positive_rate: f64) -> Result<Self, IndexError> {
        let (num_bits, num_hashes) = optimal_params(expected_items, false_positive_rate)?;
        Self::new(num_bits, num_hashes)
    }

    /// Set the `k` bits for `key`. Re-adding a key is a no-op on the bit array.
    pub fn add(&mut self, key: &[u8]) {
        let (h1, h2) = base_hashes(key);
        for i in 0..u64::from(self.num_hashes) {
            let idx = probe(h1, h2, i, self.num_bits);
            self.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
        self.insertions += 1;
    }

    /// True iff every probed bit for `key` is set.
    pub fn check(&self, key: &[u8]) -> bool {
        let (h1, h2) = base_hashes(key);
        (0..u64::from(self.num_hashes)).all(|i| {
            let idx = probe(h1, h2, i, self.num_bits);
            self.bits[(idx / 8) as usize] & (1 << (idx % 8)) != 0
        })
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of `add` calls so far, duplicates included.
    pub fn insertions(&self) -> u64 {
        self.insertions
    }

    /// Theoretical false-positive probability at the current load.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        false_positive_rate(self.num_bits, self.num_hashes, self.insertions)
    }
}

/// `(1 - e^(-kn/m))^k` for `n` keys in `m` bits with `k` probes.
pub fn false_positive_rate(num_bits: u64, num_hashes: u32, items: u64) -> f64 {
    let k = f64::from(num_hashes);
    let fill = 1.0 - (-k * items as f64 / num_bits as f64).exp();
    fill.powf(k)
}

/// Bit count and probe count that bound the false-positive rate at `expected_items`.
pub fn optimal_params(
    expected_items: u64,
    false_positive_rate: f64,
) -> Result<(u64, u32), IndexError> {
    if expected_items == 0 {
        return Err(IndexError::InvalidSize("expected item count must be positive"));
    }
    if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
        return Err(IndexError::InvalidSize(
            "false-positive rate must be between 0 and 1",
        ));
    }

    let n = expected_items as f64;
    let ln2 = std::f64::consts::LN_2;
    let bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil().max(1.0);
    let hashes = ((bits / n) * ln2).round().max(1.0);
    Ok((bits as u64, hashes as u32))
}

fn probe(h1: u64, h2: u64, i: u64, num_bits: u64) -> u64 {
    h1.wrapping_add(i.wrapping_mul(h2)) % num_bits
}

fn base_hashes(key: &[u8]) -> (u64, u64) {
    let h1 = key
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    let h2 = key
        .iter()
        .fold(FNV_OFFSET, |h, &b| h.wrapping_mul(FNV_PRIME) ^ u64::from(b));
    // An even step would revisit positions early when num_bits is a power of two.
    (h1, fmix64(h2) | 1)
}

/// Murmur3 finalizer.
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::digest::{digest, SHA256};

    fn key(n: u64) -> Vec<u8> {
        digest(&SHA256, &n.to_le_bytes()).as_ref().to_vec()
    }

    #[test]
    fn rejects_zero_bits() {
        assert!(matches!(
            BloomFilter::new(0, 3),
            Err(IndexError::InvalidSize(_))
        ));
    }

    #[test]
    fn rejects_zero_hashes() {
        assert!(matches!(
            BloomFilter::new(64, 0),
            Err(IndexError::InvalidSize(_))
        ));
    }

    #[test]
    fn empty_filter_reports_absent() {
        let bloom = BloomFilter::new(1024, 4).unwrap();
        assert!(!bloom.check(b"anything"));
        assert!(!bloom.check(b""));
    }

    #[test]
    fn no_false_negatives_across_sizes() {
        for &(bits, k) in &[(1u64, 1u32), (7, 2), (64, 3), (1000, 6), (65_536, 6), (8191, 13)] {
            let mut bloom = BloomFilter::new(bits, k).unwrap();
            let keys: Vec<Vec<u8>> = (0..500).map(key).collect();
            for entry in &keys {
                bloom.add(entry);
            }
            for entry in &keys {
                assert!(bloom.check(entry), "false negative with bits={bits} k={k}");
            }
        }
    }

    #[test]
    fn readding_is_idempotent_on_bits() {
        let mut bloom = BloomFilter::new(256, 4).unwrap();
        bloom.add(b"digest");
        let snapshot = bloom.bits.clone();
        bloom.add(b"digest");
        assert_eq!(bloom.bits, snapshot);
        assert_eq!(bloom.insertions(), 2);
    }

    #[test]
    fn string_digests_are_keys_too() {
        let mut bloom = BloomFilter::new(65_536, 6).unwrap();
        let sha = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        bloom.add(sha.as_bytes());
        assert!(bloom.check(sha.as_bytes()));
        assert!(!bloom.check(sha.to_uppercase().as_bytes()));
    }

    #[test]
    fn false_positive_rate_tracks_theory() {
        let (bits, k, n) = (16_384u64, 4u32, 2_000u64);
        let mut bloom = BloomFilter::new(bits, k).unwrap();
        for i in 0..n {
            bloom.add(&key(i));
        }

        let trials = 20_000u64;
        let hits = (n..n + trials).filter(|&i| bloom.check(&key(i))).count();
        let observed = hits as f64 / trials as f64;
        let expected = false_positive_rate(bits, k, n);

        assert!(expected > 0.01 && expected < 0.05);
        assert!(
            (observed - expected).abs() < expected * 0.5,
            "observed {observed}, expected {expected}"
        );
        assert!((bloom.estimated_false_positive_rate() - expected).abs() < 1e-12);
    }

    #[test]
    fn optimal_params_meet_target() {
        let (bits, k) = optimal_params(10_000, 0.01).unwrap();
        assert!((95_000..=96_000).contains(&bits), "bits = {bits}");
        assert_eq!(k, 7);
        assert!(false_positive_rate(bits, k, 10_000) <= 0.0101);
    }

    #[test]
    fn optimal_params_reject_bad_input() {
        assert!(optimal_params(0, 0.01).is_err());
        assert!(optimal_params(100, 0.0).is_err());
        assert!(optimal_params(100, 1.0).is_err());
        assert!(optimal_params(100, f64::NAN).is_err());
    }

    #[test]
    fn with_rate_sizes_filter() {
        let bloom = BloomFilter::with_rate(1_000, 0.01).unwrap();
        assert!(bloom.num_bits() > 9_000);
        assert_eq!(bloom.num_hashes(), 7);
    }
}
