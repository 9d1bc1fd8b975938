pub mod vbyte;
pub mod sortable;
pub mod bitstream;
