pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod storage;
pub mod web;
