//! UCS (legacy clinic registry) integration
//!
//! - [`UcsClientApi`] - operations the pipelines use
//! - [`HttpUcsClient`] - REST implementation
//! - [`UcsFeedRecord`] - change feed wire model

pub mod client;
pub mod models;

pub use client::{HttpUcsClient, UcsClientApi};
pub use models::{ChangePage, FeedAddress, UcsFeedRecord};
