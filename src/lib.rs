pub mod attributes;
pub mod bold;
pub mod config;
pub mod error;
pub mod features;
pub mod header;
pub mod logging;
pub mod output;
pub mod pool;
pub mod progress;
pub mod relevance;
pub mod remote;
pub mod s3;
pub mod selection;
pub mod table;
