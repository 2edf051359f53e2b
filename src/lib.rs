//! Band Scanner - cigar band identification
//!
//! Takes a photo of a cigar band, extracts logo and text signals through a
//! vision service and resolves them against a cigar catalog with a tiered
//! fuzzy matcher. Unmatched scans fall back to a pre-filled manual search.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod matching;
pub mod scanner;
pub mod shared;
pub mod storage;
pub mod vision;
