pub mod aggregate;
pub mod build;
pub mod compare;
pub mod download;
pub mod error;
pub mod filers;
pub mod report;
pub mod sample;
pub mod stubs;
pub mod tables;
pub mod targets;
pub mod varmap;
