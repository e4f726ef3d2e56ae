//! Change-impact resolution for pull requests.
//!
//! Given the files a pull request changes, finds the classes and methods it touches
//! and the code elsewhere in the repository that probably depends on them.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod git;
pub mod impact;
pub mod index;
pub mod language;
pub mod line_map;
pub mod logging;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod source;
pub mod text;
pub mod unit;
pub mod webhook;
pub mod workdir;
