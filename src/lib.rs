pub mod collector;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod metadata;
pub mod pattern;
pub mod pcf;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use collector::Collector;
pub use dispatch::AdminChannel;
pub use error::{CollectError, TransportError};
