//! Multi-camera capture-and-fusion service for an industrial inspection
//! station.
//!
//! For each attached camera, continuously streams live frames and, on
//! demand, performs an exposure-bracketed multi-frame fusion to produce a
//! high-dynamic-range composite for downstream defect classification. An
//! HTTP control surface exposes per-camera state, triggers fusions, and
//! serves both live preview frames and the latest fused artifact.

pub mod camera;
pub mod config;
pub mod error;
pub mod fusion;
pub mod http;
pub mod image;
pub mod pyramid;
pub mod quality;
pub mod record;
pub mod state;
pub mod supervisor;
pub mod worker;
