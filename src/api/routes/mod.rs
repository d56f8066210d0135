//! API Routes
//!
//! Route handlers organized by functionality.

pub mod chart;
pub mod dishes;
pub mod events;
pub mod health;
pub mod import;
pub mod meals;
