pub mod app;
pub mod artifacts;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod gbdt;
pub mod handler;
pub mod model;
pub mod predictor;
pub mod presenter;
pub mod schema;
