#![doc = "devops-companion-core: detection, parsing and idempotent output of DevOps file summaries."]

//! This crate holds everything that does not need a terminal or a network
//! client: the contracts the pipeline talks through, the configuration model,
//! the dialect parsers, the enrichment gateway, the processing coordinator and
//! the polling watcher.
//!
//! # Usage
//! Build a [`pipeline::ProcessingCoordinator`] from a [`contract::Storage`],
//! a [`contract::Notifier`] and a [`contract::Transport`], then either call it
//! directly or hand it to [`watcher::spawn`].

pub mod config;
pub mod contract;
pub mod enrich;
pub mod import;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod storage;
pub mod watcher;
