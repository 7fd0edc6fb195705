//! API Route Handlers

pub mod derive;
pub mod views;
