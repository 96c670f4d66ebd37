//! Types shared by every Relay crate

mod error;

pub use error::{ERROR_TYPE, HttpError};
