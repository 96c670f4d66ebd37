#![allow(dead_code)]

pub mod config;
pub mod fake_cli;
pub mod server;
