#![no_std]
extern crate alloc;

pub mod trie;

pub use trie::{Captures, InsertError, RouteTrie};
