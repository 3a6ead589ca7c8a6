// Util module - shared byte-level plumbing

pub mod byte_buffer;

pub use byte_buffer::ByteBuffer;
