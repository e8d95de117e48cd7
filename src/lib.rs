pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod init;
pub mod layout;
pub mod npy;
pub mod output;
pub mod processing;
pub mod progress;
pub mod registry;
pub mod rules;
pub mod scheduler;
pub mod solution;
pub mod stations;
pub mod store;
pub mod synthetics;

pub use error::Gcmt3dError;
pub use layout::{WorkspacePaths, layout};
pub use processing::adapt;
pub use scheduler::plan_downloads;
