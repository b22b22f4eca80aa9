#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage collaborator traits for reports, alerts, and subscribers.
//!
//! The engine never talks to a persistence layer directly; moderation and
//! the fan-out go through [`ReportStore`] and [`SubscriberStore`]. The
//! in-memory implementations in [`memory`] back the server binary, the
//! demo CLI, and tests.

pub mod memory;

use async_trait::async_trait;
use blockwatch_alert_models::{PublishedAlert, RawReport, Subscriber, SubscriberUpdate};
use uuid::Uuid;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("record not found: {id}")]
    NotFound {
        /// ID of the missing record.
        id: String,
    },

    /// The backing store failed.
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },
}

/// Store of raw incident reports and published alerts.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persists a new raw report and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn create_report(&self, report: RawReport) -> Result<Uuid, StoreError>;

    /// Persists a published alert and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn create_alert(&self, alert: PublishedAlert) -> Result<Uuid, StoreError>;

    /// Lists all pending reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn list_pending(&self) -> Result<Vec<RawReport>, StoreError>;

    /// Deletes a report if it is still present.
    ///
    /// Returns `Ok(true)` when the report existed and was deleted, and
    /// `Ok(false)` when it was already gone. A report removed by another
    /// operator in the meantime is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete itself fails.
    async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Store of push subscribers and their last known locations.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Reads every subscriber in one bulk query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn list_all(&self) -> Result<Vec<Subscriber>, StoreError>;

    /// Finds the subscriber currently holding the given push token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn find_by_push_token(&self, token: &str) -> Result<Option<Subscriber>, StoreError>;

    /// Applies a partial update to an existing subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no subscriber with `user_id`
    /// exists.
    async fn update(&self, user_id: &str, update: SubscriberUpdate) -> Result<(), StoreError>;

    /// Applies a partial update, creating the subscriber if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn merge(&self, user_id: &str, update: SubscriberUpdate) -> Result<(), StoreError>;
}
