// tezpack-common/src/lib.rs
pub mod config;
pub mod dependency;
pub mod error;
pub mod formulary;
pub mod model;

// Re-export key types
pub use config::Config;
pub use error::{Result, TezpackError};
pub use formulary::Formulary;
pub use model::Formula;
