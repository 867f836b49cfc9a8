pub mod analysis;
pub mod chart;
pub mod contract;
pub mod insights;
pub mod records;
pub mod scoring;
pub mod sentiment;
