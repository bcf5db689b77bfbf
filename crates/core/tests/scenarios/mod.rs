//! End-to-end scenarios for the three timing models.

/// Data-cache timing scenarios.
pub mod cache_model;

/// Frontend and branch-prediction scenarios.
pub mod fetch_model;

/// Backend structural-hazard scenarios.
pub mod issue_model;
