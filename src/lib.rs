//! Profile Wizard: multi-step onboarding engine with a locally persisted
//! draft and per-step remote sync.

pub mod config;
pub mod draft;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod remote;
pub mod steps;
pub mod validation;
pub mod wizard;
