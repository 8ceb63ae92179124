#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod quiz_session;
pub mod time;

pub use error::Error;
pub use time::Clock;
