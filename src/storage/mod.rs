pub mod table;
pub mod memory;
pub mod tables;
pub mod layout;
pub mod file_lock;
pub mod persist;
