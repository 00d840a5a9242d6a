//! Name and content encryption on top of the cryptor

pub mod alternative;
pub mod content;
pub mod file_ctrmac;
pub mod name;

// Re-export commonly used types
pub use alternative::{alternative_name, candidate_names};
pub use content::{AccessMode, ChunkLayout, ChunkedFile, ContentConfig, RotationPolicy};
pub use name::{decrypt_filename, encrypt_filename, hash_dir_id};
