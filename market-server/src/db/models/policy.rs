//! Policy Model
//!
//! Versioned platform policies and recorded user consent.

use serde::{Deserialize, Serialize};

/// Policy entity; (slug, version) is unique
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Policy {
    pub id: String,
    pub slug: String,
    pub version: i64,
    pub title: String,
    pub body: String,
    pub published_at: i64,
}

/// Publish policy payload
#[derive(Debug, Clone)]
pub struct PolicyCreate {
    pub slug: String,
    pub version: i64,
    pub title: String,
    pub body: String,
}

/// A user's acceptance of a specific policy version
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PolicyAcceptance {
    pub policy_id: String,
    pub slug: String,
    pub version: i64,
    pub accepted_at: i64,
}
