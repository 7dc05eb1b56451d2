pub mod agents;
pub mod config;
pub mod lint;
pub mod master;
pub mod segment;
pub mod skills;
