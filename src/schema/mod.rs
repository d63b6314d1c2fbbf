//! Data model: content, templates, quotes, and generation records.

pub mod content;
pub mod quote;
pub mod session;
pub mod sport;
pub mod template;
