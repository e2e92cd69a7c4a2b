pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod mqtt;
pub mod web;
