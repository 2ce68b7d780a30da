pub mod classify;
pub mod compare;
pub mod concentration;
pub mod population;
pub mod report;
pub mod weighted;
