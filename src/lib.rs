//! Polling core for Météo-France's DPObs minute-by-minute observations.
//!
//! One configured station is fetched on a fixed period over blocking HTTP,
//! its raw field values converted to display units, and the result cached
//! as an immutable snapshot. Entity views read that snapshot on demand,
//! either as one aggregate entity or as one entity per cataloged field. The
//! daemon binary drives the same core a host platform would.

pub mod catalog;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod entity;
pub mod ingest;
pub mod logging;
pub mod model;
