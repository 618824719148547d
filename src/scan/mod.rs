//! Structure analysis of a fetched snapshot

pub mod scanner;
pub mod tree;

pub use scanner::StructureAnalyzer;
pub use tree::{render_tree, render_tree_within};
