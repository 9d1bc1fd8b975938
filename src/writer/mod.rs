pub mod write_buffer;
pub mod index_writer;
