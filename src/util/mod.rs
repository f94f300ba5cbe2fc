//! Shared utility helpers.

pub mod error;
pub mod math;

pub use error::{DetPostError, DetPostResult};
pub use math::EPS;
