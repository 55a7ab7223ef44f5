// Library crate for the binary and the integration tests.

pub mod config;
pub mod error;
pub mod history;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod publish;
