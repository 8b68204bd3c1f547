//! Inkpress - a multi-author blog with a moderated publishing workflow
//!
//! Members write drafts and submit them for review; staff publish or reject.
//! New blogs are filed into a category by an optional AI classifier.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod web;
