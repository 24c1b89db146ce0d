//! Run state: the document every client polls, and the store that owns it

pub mod model;
pub mod store;

pub use model::{
    normalize_domain, AgentSummary, CompanyKey, NoteKind, Phase, Run, RunNote, RunStatus,
    RunSummary,
};
pub use store::RunStore;
