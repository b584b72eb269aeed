
/// Helper functions for reading/writing JSON via serde, with optional gzip
pub mod json_io;
