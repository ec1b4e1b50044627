//! Multilingual content pipeline for the SIM plan comparison site.
//!
//! Korean tips and plan descriptions are translated into the other site
//! languages, checked for leftover Korean text, and kept consistent across
//! language variants (internal links, thumbnails, related-post links).

pub mod app;
pub mod config;
pub mod consistency;
pub mod content;
pub mod db;
pub mod i18n;
pub mod orchestrator;
pub mod quality;
pub mod retry;
pub mod scheduler;
pub mod security;
pub mod store;
pub mod translation;
