//! The on-disk B+ tree engine: a node codec, two file managers, and the
//! insert/delete/range algorithms that operate on them. `tree::Tree` is the
//! only public surface; everything else here is wiring.
mod data_file;
mod delete;
mod index_file;
mod insert;
mod navigator;
mod node;
mod range;
mod tree;

pub use tree::Tree;
