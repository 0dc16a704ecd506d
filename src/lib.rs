pub mod config;
pub mod contact;
pub mod domain;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod math;
pub mod output;
pub mod state;
