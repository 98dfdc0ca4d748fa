pub mod encoder;
pub mod http;
pub mod stdout;

pub use encoder::{encode_component, encode_query, encode_uri};
pub use http::{HttpSender, SenderConfig, SenderStats, SenderStatsSnapshot};
pub use stdout::StdoutSender;
