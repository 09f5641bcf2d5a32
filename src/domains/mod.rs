pub mod content;
pub mod export;
