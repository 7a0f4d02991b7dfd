pub mod args;
pub mod cache;
pub mod candidates;
pub mod category;
pub mod config;
pub mod export;
pub mod fetch;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod select;
pub mod source;
pub mod store;
pub mod utils;

pub use args::Args;
pub use cache::{CacheError, Snapshot, SnapshotCache};
pub use candidates::{enumerate_candidates, Candidate};
pub use category::Category;
pub use config::PipelineConfig;
pub use merge::{merge, CategoryFrequency, MergedFrequency, ValueStat};
pub use parser::{parse_draw, DrawAggregate, ParseError};
pub use pipeline::{Backfill, Phase, PhaseReport, Pipeline};
pub use select::{select_dates, Selection, SelectionPolicy};
pub use source::{DirSource, DrawSource, FetchError, HttpSource, RawDraw};
pub use store::AggregateStore;
