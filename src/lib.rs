pub mod aggregate;
pub mod cli;
pub mod config;
pub mod db;
pub mod delta;
pub mod error;
pub mod github;
pub mod ignore;
pub mod model;
pub mod notes;
pub mod outputs;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod snapshot;
pub mod store;
pub mod writer;
