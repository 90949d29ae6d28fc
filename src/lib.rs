//! Department-scoped document question answering.
//!
//! Users log in against MongoDB, and each query is answered only from
//! the documents indexed for the user's department.

pub mod auth;
pub mod core;
pub mod department;
pub mod ingest;
pub mod llm;
pub mod qa;
pub mod rag;
pub mod server;
pub mod state;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
