#![forbid(unsafe_code)]

pub mod chapters;
pub mod classify;
pub mod cli;
pub mod command;
pub mod consolidate;
pub mod env;
pub mod extract;
pub mod fanout;
pub mod formats;
pub mod gemini;
pub mod index;
pub mod logging;
pub mod model;
pub mod openai;
pub mod prompts;
pub mod publish;
pub mod render;
pub mod store;
