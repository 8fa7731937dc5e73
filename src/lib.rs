//! Primer - a terminal client for co-authoring illustrated stories with an
//! AI tutor.
//!
//! The state machine in `app` owns every transition; `dispatch` runs the
//! async work; `db` and `ai` are the storage and generation gateways. The
//! binary entry point is in main.rs.

pub mod ai;
pub mod app;
pub mod db;
pub mod dispatch;
pub mod input;
pub mod models;
pub mod seed;
pub mod theme;
pub mod ui;
