//! City Traffic Simulation Library
//!
//! A cell-based traffic simulation on a procedurally generated city grid.

pub mod simulation;
