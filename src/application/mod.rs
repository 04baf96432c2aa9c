//! Command surface: the context commands run in and the commands themselves.

pub mod commands;
pub mod context;
pub mod error;
pub mod print;
