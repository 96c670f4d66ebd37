//! Conversion between wire formats and internal types

pub mod openai;
