//! Web search clients used by the research agents

pub mod client;
pub mod tavily;

pub use client::{
    ExtractResponse, ExtractedPage, SearchClient, SearchDepth, SearchHit, SearchRequest,
    SearchResponse, SearchTopic,
};
pub use tavily::TavilyClient;
