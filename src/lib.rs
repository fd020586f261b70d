//! Rapport - conversation intelligence for automated messaging.
//!
//! Learns a communication style from a user's scored conversation history,
//! detects counterpart disinterest, times replies, and drives an automated
//! reply loop per conversation goal through pluggable AI, humanizer,
//! storage and platform ports.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
