use thiserror::Error;

/// Errors raised while constructing a beacon or its transports.
///
/// Submission never produces one of these; failures on the delivery path are
/// logged and the record is dropped.
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
