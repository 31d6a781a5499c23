//! Payload encoding: the registry's extension map in a versioned bitcode
//! envelope, wrapped in a [`file_header`](crate::file_header).

use std::collections::BTreeMap;

use bitcode::{Decode, Encode};

use crate::file_header::{decode_payload, unwrap_header, wrap_with_header};
use crate::save_error::SaveError;

/// Schema version of [`RailwaySave`].
pub const CURRENT_SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct RailwaySave {
    pub version: u32,
    /// Fixed ticks simulated when the save was taken.
    pub tick: u64,
    /// Saveable key to encoded resource.
    pub extensions: BTreeMap<String, Vec<u8>>,
}

impl RailwaySave {
    pub fn new(tick: u64, extensions: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            version: CURRENT_SAVE_VERSION,
            tick,
            extensions,
        }
    }

    /// Encode into file bytes, header included.
    pub fn to_file_bytes(&self, compress: bool) -> Vec<u8> {
        wrap_with_header(&bitcode::encode(self), compress)
    }

    pub fn from_file_bytes(bytes: &[u8]) -> Result<Self, SaveError> {
        let (header, payload) = unwrap_header(bytes)?;
        let data = decode_payload(&header, payload)?;
        let save: RailwaySave = bitcode::decode(&data)?;
        if save.version > CURRENT_SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected_max: CURRENT_SAVE_VERSION,
                found: save.version,
            });
        }
        Ok(save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RailwaySave {
        let mut extensions = BTreeMap::new();
        extensions.insert("fleet".to_string(), vec![1, 2, 3]);
        extensions.insert("routing_graph".to_string(), vec![9; 64]);
        RailwaySave::new(420, extensions)
    }

    #[test]
    fn test_roundtrip_both_encodings() {
        let save = sample();
        for compress in [false, true] {
            let bytes = save.to_file_bytes(compress);
            assert_eq!(RailwaySave::from_file_bytes(&bytes).expect("decode"), save);
        }
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut save = sample();
        save.version = CURRENT_SAVE_VERSION + 1;
        let bytes = save.to_file_bytes(false);
        assert!(matches!(
            RailwaySave::from_file_bytes(&bytes),
            Err(SaveError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_valid_header_bad_body_is_decode_error() {
        let bytes = wrap_with_header(&[0xff; 5], false);
        assert!(matches!(
            RailwaySave::from_file_bytes(&bytes),
            Err(SaveError::Decode(_))
        ));
    }
}
