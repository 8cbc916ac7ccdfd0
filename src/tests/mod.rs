//! Tests for the Libris backend.
//!
//! - **support**: temporary database, seeded users and request helpers
//! - **api_tests**: book list/filter/search/ordering and CRUD endpoints
//! - **relation_api_tests**: like/bookmark/rating upsert endpoint
//! - **catalog_tests**: aggregation query and listing helpers
//! - **policy_tests**: owner-or-staff write rule
//! - **error_tests**: error responses and field validators
//! - **types_tests**: request body decoding
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema, constraints and cascades
//! - **health_api_tests**: health, readiness, metrics and version endpoints

pub mod support;

pub mod catalog_tests;
pub mod health_api_tests;
pub mod policy_tests;
