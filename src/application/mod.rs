//! Application services: the read and write paths over the cache layer.

pub mod context;
pub mod error;
pub mod reads;
pub mod repos;
pub mod writes;
