//! Domain layer for rask-beacon.
//!
//! Contains the types shared across all modules:
//! - `Record`: one telemetry event and its kind-specific payload
//! - `Options` / `OptionsPatch`: runtime configuration and its partial merge form
//! - `BeaconError`: error type for the fallible construction paths

pub mod error;
pub mod options;
pub mod record;

pub use error::BeaconError;
pub use options::{DEFAULT_HOST, DEFAULT_SAMPLE, Options, OptionsPatch};
pub use record::{
    AckKind, ApiCall, ErrorParams, ErrorReport, FieldValue, MAX_STRING, Payload, Record,
    SYSTEM_ERROR_TYPE, Stamp,
};
