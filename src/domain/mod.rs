pub mod availability;
pub mod generator;
pub mod models;
pub mod packer;
