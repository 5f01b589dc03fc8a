// Resume Q&A: chunk-and-retrieve pipeline over an uploaded resume PDF.
// Embeddings, nearest-neighbor search and generation are external services;
// this module owns chunk bookkeeping, orchestration and the keyword fallback.

pub mod chunker;
pub mod handlers;
pub mod pdf;
pub mod prompts;
pub mod retriever;
pub mod service;
pub mod synthesizer;
pub mod vector_store;
