pub mod hhi;
pub mod merger;
