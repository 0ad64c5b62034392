//! Built-in plugins.

pub mod autosave;
pub mod callout;
pub mod code;
pub mod divider;
pub mod footnote;
pub mod history;
pub mod slash;
pub mod word_count;
