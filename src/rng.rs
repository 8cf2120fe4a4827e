use rand_core::{Error, RngCore};
use std::time::{SystemTime, UNIX_EPOCH};

// xoshiro256** seeded through SplitMix64.
// Reference: https://prng.di.unimi.it/

#[derive(Clone, Debug)]
pub struct Rng {
    state: [u64; 4],
}

impl Rng {
    pub fn from_seed(mut seed: u64) -> Self {
        let mut splitmix = || -> u64 {
            seed = seed.wrapping_add(0x9e3779b97f4a7c15);
            let mut z = seed;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            z ^ (z >> 31)
        };

        Rng {
            state: [splitmix(), splitmix(), splitmix(), splitmix()],
        }
    }

    /// Seeds from wall-clock nanoseconds mixed with a heap address.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed_cafe_f00d_d00d);
        let probe = Box::new(0u8);
        let addr = &*probe as *const u8 as u64;
        Self::from_seed(nanos ^ addr.rotate_left(32))
    }

    /// Derives an independent stream, e.g. one per simulation chunk.
    pub fn fork(base_seed: u64, stream: u64) -> Self {
        Self::from_seed(base_seed.wrapping_add(stream.wrapping_mul(0x9e3779b97f4a7c15)))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let result = self.state[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);

        result
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        (Rng::next_u64(self) >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        Rng::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = Rng::next_u64(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Sampling helpers shared by the simulator and the session.
pub trait RollExt: RngCore {
    /// Uniform float in [0, 1) built from the top 53 bits.
    #[inline]
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / 9007199254740992.0)
    }

    /// Uniform integer in [0, n) without modulo bias.
    #[inline]
    fn below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let range = n as u64;
        let threshold = range.wrapping_neg() % range;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return (x % range) as usize;
            }
        }
    }

    #[inline]
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Fisher-Yates.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }

    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.below(items.len())])
        }
    }
}

impl<R: RngCore + ?Sized> RollExt for R {}
