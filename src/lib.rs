pub mod clock;
pub mod collaborators;
pub mod config;
pub mod contracts;
pub mod discovery;
pub mod governor;
pub mod native;
pub mod orchestrator;
pub mod pricing;
pub mod progress;
pub mod query;
pub mod repository;
pub mod rpc;
pub mod scheduler;
pub mod store;
