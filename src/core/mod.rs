//! Generation pipeline stages and the repositories they read from.

pub mod compiler;
pub mod config;
pub mod context;
pub mod draft;
pub mod pipeline;
pub mod quotes;
pub mod repository;
pub mod resolver;
pub mod sport;
pub mod timing;
pub mod variety;
