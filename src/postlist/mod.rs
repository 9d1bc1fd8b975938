pub mod chunk;
pub mod reader;
pub mod writer;
pub mod merge;
pub mod iterator;
