//! LectureMate CLI library.
//!
//! Command-line front end for summarizing lecture transcripts, inspecting
//! chunk plans and asking follow-up questions.

pub mod cli;
pub mod commands;
pub mod offline;
