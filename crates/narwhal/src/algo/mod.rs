//! Numerical collaborators of the layout driver.

pub mod descent;
pub mod disconnected;
pub mod link_lengths;
pub mod power_graph;
pub mod shortest_paths;
pub mod vpsc;

/// `f64` ordered by `total_cmp`, for heaps and ordered sets keyed by coordinates.
///
/// Public because it keys the overlap generator's [`Scanline`](crate::overlap::Scanline), which
/// custom [`SweepAxis`](crate::overlap::SweepAxis) implementations receive.
#[derive(Debug, Clone, Copy)]
pub struct TotalF64(pub f64);

impl PartialEq for TotalF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Deterministic xorshift64* generator (Vigna, multiplier `0x2545F4914F6CDD1D`). Seeds the
/// jitter that pulls coincident points apart, so runs with the same seed are reproducible.
///
/// Seeding with zero would lock the state at zero, so the seed is clamped to at least 1.
#[derive(Debug, Clone)]
pub(crate) struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    pub(crate) fn next_f64_unit(&mut self) -> f64 {
        let u = self.next_u64() >> 11;
        (u as f64) / ((1u64 << 53) as f64)
    }

    pub(crate) fn next_between(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64_unit() * (max - min)
    }
}
