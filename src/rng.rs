//! Детерминированные генераторы случайных чисел по стадиям
//!
//! Каждая стадия получает собственный `ChaCha8Rng`, выведенный из общего сида и
//! номера стадии. Общего «окружающего» источника случайности нет, поэтому результат
//! не зависит ни от порядка стадий, ни от планировщика потоков.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy)]
pub struct StageSeeds {
    base: u64,
}

impl StageSeeds {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { base: seed }
    }

    /// Сид для произвольной фазы (стадии или подзадачи внутри стадии).
    #[must_use]
    pub fn seed_for(&self, phase: u64) -> u64 {
        splitmix(self.base ^ phase.wrapping_mul(GOLDEN_GAMMA))
    }

    #[must_use]
    pub fn rng(&self, phase: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed_for(phase))
    }

    /// Сид шума: `fastnoise-lite` принимает `i32`.
    #[must_use]
    pub fn noise_seed(&self, phase: u64) -> i32 {
        (self.seed_for(phase) >> 32) as i32
    }
}

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
