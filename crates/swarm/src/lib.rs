pub mod agent;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod function;
pub mod models;
pub mod providers;
pub mod registry;
pub mod swarm;
