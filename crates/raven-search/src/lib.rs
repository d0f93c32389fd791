#![forbid(unsafe_code)]

//! The bytecode search engine: typed queries over a parallel-traversable
//! class corpus, with deterministic ordering, typed result paths, and
//! pagination.

mod decompiled;
mod engine;
mod page;
mod path;
mod predicate;
mod query;

pub use crate::decompiled::{
    search_decompiled, DecompiledMatch, DecompiledSearch, DEFAULT_CLASS_CAP, MAX_CLASS_CAP,
};
pub use crate::engine::{
    run_query, AnalysisProvider, AnalyzeDirect, ResultDetail, SearchOptions, SearchResult,
};
pub use crate::page::{Page, Paged, DEFAULT_LIMIT, MAX_LIMIT};
pub use crate::path::{PathBuilder, PathChain, PathNode};
pub use crate::predicate::{NumberPredicate, TextPredicate};
pub use crate::query::Query;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,
}
