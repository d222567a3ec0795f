pub mod metadata;

pub use metadata::{DataQuery, HeadBlockExtractor, Metadata, MetadataError, MetadataExtractor};

/// Bytes read from the head of a templated file when looking for its
/// metadata block.
pub const HEAD_LIMIT: usize = 4096;
