//! Parse server backend: cloud functions for room control, REST polling for push.

mod config;
mod error;
mod store;

pub use self::config::ParseConfig;
pub use self::error::{ParseError, ParseResult};
pub use self::store::ParseBackend;
