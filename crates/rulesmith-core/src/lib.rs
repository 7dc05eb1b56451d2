pub mod classifier;
pub mod config;
pub mod convert;
pub mod emit;
pub mod error;
pub mod frontmatter;
pub mod io;
pub mod lint;
pub mod master;
pub mod paths;
pub mod section;
pub mod sync;

pub use error::{Result, RuleError};
