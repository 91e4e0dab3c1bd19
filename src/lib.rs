#[macro_use]
mod id;

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
mod error;
pub mod server;
pub mod store;
pub mod ticket;

pub use self::{
    config::Config,
    engine::Engine,
    error::{Error, Invalid, Missing},
};
