pub mod positions;
pub mod termlist;
pub mod values;
