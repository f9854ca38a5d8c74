// tezpack-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{fetch_bottle, fetch_opam_installer};
pub use validation::{validate_url, verify_checksum, verify_content_type};
