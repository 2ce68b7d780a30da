pub mod peer;
pub mod significance;
