//! Deterministic RNG resource.
//!
//! Cart identities are minted from a seeded `ChaCha8Rng`, so two runs from
//! the same seed build identical fleets. The stream position is saved with
//! the world.

use bevy::prelude::*;
use bitcode::{Decode, Encode};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ids::CartUuid;

const DEFAULT_SEED: u64 = 0x5241_494c;

/// Full `ChaCha8Rng` state in a form bitcode can store.
#[derive(Encode, Decode)]
struct RngSnapshot {
    seed: [u8; 32],
    word_pos: u128,
    stream: u64,
}

impl RngSnapshot {
    fn from_rng(rng: &ChaCha8Rng) -> Self {
        Self {
            seed: rng.get_seed(),
            word_pos: rng.get_word_pos(),
            stream: rng.get_stream(),
        }
    }

    fn to_rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }
}

#[derive(Resource)]
pub struct SimRng(pub ChaCha8Rng);

impl Default for SimRng {
    fn default() -> Self {
        Self::from_seed_u64(DEFAULT_SEED)
    }
}

impl SimRng {
    pub fn from_seed_u64(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// A fresh random-looking cart identity (version 4 layout).
    pub fn next_uuid(&mut self) -> CartUuid {
        let raw: u128 = self.0.gen();
        let versioned = (raw & !(0xf << 76)) | (0x4 << 76);
        let variant = (versioned & !(0x3 << 62)) | (0x2 << 62);
        CartUuid(variant)
    }
}

impl crate::Saveable for SimRng {
    const SAVE_KEY: &'static str = "sim_rng";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        Some(bitcode::encode(&RngSnapshot::from_rng(&self.0)))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        match bitcode::decode::<RngSnapshot>(bytes) {
            Ok(snapshot) => Self(snapshot.to_rng()),
            Err(e) => {
                warn!("SimRng: failed to decode save data, falling back to default: {}", e);
                Self::default()
            }
        }
    }
}
