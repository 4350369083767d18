pub mod bootstrap;
pub mod commands;
pub mod event_store;
pub mod explainer;
pub mod family;
pub mod identity;
pub mod interests;
pub mod planner;
pub mod profiles;
