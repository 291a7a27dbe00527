//! API handlers module

pub mod chat;
pub mod concepts;
pub mod health;
pub mod market;
