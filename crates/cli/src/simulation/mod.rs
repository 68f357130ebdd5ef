//! Simulated collection session.

mod companion;
mod runner;
mod stats;

pub use runner::{Simulation, SimulationConfig};
