//! Infrastructure layer: event store, dispatcher, read models, numbering,
//! reference data, configuration and the delivery application service.

pub mod catalog;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod sequence;
pub mod service;

#[cfg(test)]
mod integration_tests;
