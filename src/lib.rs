//! # uav-oracle
//!
//! A fitness oracle for aerial-vehicle designs encoded as compact grammar strings.
//!
//! It decouples the *Genotype* (design string) from the *Phenotype* (a staged,
//! weighed vehicle flown by a fixed-step simulator), producing an [`Evaluation`]
//! that an outer design-search process can consume as a scalar fitness signal.
//! Rendering is left to whoever implements [`PlacementSink`].

pub mod airframe;
pub mod assembly;
pub mod blueprint;
pub mod config;
pub mod error;
pub mod grammar;
pub mod layout;
pub mod oracle;
pub mod pid;
pub mod placement;
pub mod simulator;
pub mod vehicle;

pub use airframe::*;
pub use assembly::*;
pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use grammar::*;
pub use layout::*;
pub use oracle::*;
pub use pid::*;
pub use placement::*;
pub use simulator::*;
pub use vehicle::*;
