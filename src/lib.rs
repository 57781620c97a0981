//! Reconciles the daily CB Failed billing-provider exception report against reference
//! dictionaries, correction sheets, the NPPES registry and codes learned from corrections.
//!
//! The core (`corrections`, `resolver`, `learning`, `classify`) works on in-memory data;
//! `workbook`, `dictionary` loading and `npi::NppesClient` are the I/O edges.

pub mod classify;
pub mod common;
pub mod constants;
pub mod corrections;
pub mod dictionary;
pub mod learning;
pub mod npi;
pub mod report;
pub mod resolver;
pub mod workbook;
