//! Wire format types at the two edges of the proxy
//!
//! `openai` is what clients speak; `cli` is the event stream the backend
//! CLI writes in `stream-json` mode. Both are plain serde structs used only
//! for (de)serialization.

pub mod cli;
pub mod openai;
