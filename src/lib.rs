//! Band song proposals, voting and setlist server library.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod setlist;
