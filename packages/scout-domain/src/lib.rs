pub mod catalog;
pub mod distance;
pub mod geo;
pub mod profile;
pub mod query;
pub mod ranking;
pub mod rationale;
pub mod scoring;
pub mod text;
pub mod trial;

mod error;

pub use error::{Error, Result};
