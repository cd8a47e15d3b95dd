//! Agentic research assistant: a multi-stage workflow engine that routes a
//! query to local or web retrieval, synthesizes findings, self-evaluates
//! answer confidence, and loops back for more evidence once when confidence
//! falls short.

pub mod api;
pub mod chunking;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod service;
pub mod session;
pub mod workflow;
