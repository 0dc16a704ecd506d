pub mod constants;
pub mod physical;
pub mod simulation;
