pub mod aggregate;
pub mod export;
pub mod report;
pub mod statistics;

pub use statistics::StatisticsService;
