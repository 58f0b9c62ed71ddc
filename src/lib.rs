pub mod constants;
pub mod engine;
pub mod input_protocol;
pub mod rng;
pub mod session_store;
pub mod types;
pub mod world;
