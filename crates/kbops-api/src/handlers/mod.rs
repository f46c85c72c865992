//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod chat;
pub mod health;
pub mod ui;
