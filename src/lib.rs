//! Patent metadata harvesting: seed lookup, family expansion, Google Patents
//! enrichment and consolidated output.

pub mod api;
pub mod cli;
pub mod config;
pub mod history;
pub mod jobs;
pub mod logging;
pub mod output;
pub mod patents;
pub mod pipeline;
pub mod sources;
