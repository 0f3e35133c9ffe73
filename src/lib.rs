pub mod carbon;
pub mod cli;
pub mod config;
pub mod generator;
pub mod records;
pub mod scenario;
pub mod storage;
