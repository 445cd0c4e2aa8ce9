use psy_core::derive_substream_seed;

const FALLBACK_STREAM: u64 = 0x0FA1_1BAC;
const JITTER_STREAM: u64 = 0x0717_7E50;
const OBSERVER_STREAM: u64 = 0x0B5E_5E57;

/// Seed of the engine's fallback design draws.
pub fn fallback_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, FALLBACK_STREAM)
}

/// Seed of the staircase's multiplicative jitter.
pub fn jitter_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, JITTER_STREAM)
}

/// Seed of a simulated observer that starts responding at trial `offset`.
///
/// Resumed sessions pass the number of trials already recorded, so the
/// continuation does not replay the responses of the first segment.
pub fn observer_seed(master_seed: u64, offset: usize) -> u64 {
    derive_substream_seed(
        derive_substream_seed(master_seed, OBSERVER_STREAM),
        offset as u64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_distinct() {
        let seeds = [
            fallback_seed(7),
            jitter_seed(7),
            observer_seed(7, 0),
            observer_seed(7, 10),
        ];
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(observer_seed(7, 3), observer_seed(7, 3));
    }
}
