pub mod config;
pub mod error;
pub mod types;

pub use error::{SeelError, SeelResult};
pub use types::{now_millis, ContentId, OneOrMany};
