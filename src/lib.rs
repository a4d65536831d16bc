pub mod config;
pub mod ctl;
pub mod declare;
pub mod repair;
pub mod report;
pub mod repro;
