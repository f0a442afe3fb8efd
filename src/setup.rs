pub mod artefacts;
pub mod network;
pub mod pipeline;
