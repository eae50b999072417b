pub mod engine;

pub use engine::{CrawlReport, CrawlSettings, CrawlState, Crawler};
