//! Internal request representation
//!
//! Wire formats convert into these types at the edge; everything past the
//! handler works on them only.

pub mod message;
pub mod request;

pub use message::{ChatMessage, Role};
pub use request::ChatRequest;
