//! Utility functions for ryt-nsig

pub mod cache;
pub mod memo;
pub mod url;

pub use cache::*;
pub use memo::*;
pub use self::url::*;
