pub mod completions;
pub mod index;
pub mod report;
