pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod repository;
pub mod session;
pub mod state;
pub mod store;
