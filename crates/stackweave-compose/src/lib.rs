//! # stackweave-compose
//!
//! Composes a deployment topology into a validated, immutable resource plan.
//!
//! Handles:
//! - **Network**: availability domains with one public and one private subnet each.
//! - **Security**: security groups and the unidirectional ingress rules between them.
//! - **Provision**: the managed database, its generated credential, and the cache.
//! - **Service**: the load-balanced container service and its resolved environment.
//! - **Composer**: the fixed-order entry point that wires everything together.
//! - **Graph**: dependency graph construction and topological deployment order.
//! - **Validator**: structural checks run before a plan is handed out.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod composer;
pub mod credentials;
pub mod graph;
pub mod network;
pub mod plan;
pub mod provision;
pub mod security;
pub mod service;
pub mod validator;

pub use composer::{compose, compose_with};
pub use plan::{PlanBuilder, PlanShape, ResourcePlan};
