//! Durable storage for a railway: every resource the simulation registers
//! in its `SaveableRegistry`, written to one checksummed file.

mod atomic_write;
pub mod codec;
pub mod file_header;
pub mod save_error;
mod save_plugin;


pub use codec::RailwaySave;
pub use save_error::SaveError;
pub use save_plugin::{
    apply_railway_bytes, encode_railway, load_railway, save_railway, LoadRailwayEvent,
    RailSavePlugin, SaveOutcome, SaveRailwayEvent, SaveSettings,
};
