use std::fmt;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Generation-checked handle of a live cart.
    pub struct CartKey;
    /// Generation-checked handle of a live train. A stale key (the train was
    /// merged away, split off or disbanded) simply stops resolving.
    pub struct TrainKey;
}

/// Persistent identity of a cart. Survives parking and save/load, unlike
/// [`CartKey`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct CartUuid(pub u128);

impl fmt::Display for CartUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}
