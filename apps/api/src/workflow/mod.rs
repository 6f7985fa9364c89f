// Upload workflow: state machine, orchestrator, job registry and HTTP handlers.
// Collaborators (storage, rasterizer, inference, store) are reached only through their traits.

#[cfg(test)]
pub mod fakes;
pub mod handlers;
pub mod jobs;
pub mod orchestrator;
pub mod state;
