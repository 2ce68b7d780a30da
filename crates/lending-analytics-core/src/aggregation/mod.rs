pub mod summary;
pub mod weighted;
