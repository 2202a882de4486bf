//! Stream Finder Library
//!
//! Scrapes movie catalogs from video hosting sites with a configurable
//! selector profile, and resolves episode pages to playable stream URLs by
//! sniffing them in a remote headless browser.

pub mod cache;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod repository;
pub mod routes;
pub mod scraper;
pub mod sniffer;
