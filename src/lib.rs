#![deny(warnings, rust_2024_compatibility)]
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
#![allow(
    clippy::cast_possible_truncation, // Millisecond spans are bounded to one day
    clippy::cast_possible_wrap,       // Counters stay far below i64::MAX
    clippy::cast_sign_loss,           // Spans are checked non-negative before casting
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod ack;
pub mod app;
pub mod buffer;
pub mod domain;
pub mod probe;
pub mod sender;

pub use ack::{AckAdapter, Beacon, BeaconBuilder, ReadyReport};
pub use buffer::{AckQueue, Delivery, SubmitOutcome};
pub use domain::{ApiCall, BeaconError, ErrorParams, Options, OptionsPatch, Record};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
