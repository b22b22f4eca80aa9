//! Subscriber push-token and location registration.
//!
//! Runs when a device (re)registers, not during fan-out. Registration is
//! last-writer-wins: two devices registering the same token concurrently
//! can race, and the later write sticks. That race is accepted; the loser
//! regenerates a token on its next launch.

use blockwatch_alert_models::SubscriberUpdate;
use blockwatch_store::{StoreError, SubscriberStore};
use chrono::Utc;

/// Reason stamped on a subscriber whose push token was taken over by a
/// registration from another subscriber.
pub const TOKEN_CLAIMED_REASON: &str = "claimed by another device";

/// Persists `push_token` for `user_id`, evicting any other subscriber
/// currently holding the same token.
///
/// The evicted subscriber gets a cleared token plus a reason and
/// timestamp, so their app regenerates a token on next launch. Failing to
/// clear the previous holder is logged but never blocks the registering
/// subscriber's own write.
///
/// # Errors
///
/// Returns [`StoreError`] if the holder lookup or the registering
/// subscriber's own write fails.
pub async fn register_push_token(
    store: &dyn SubscriberStore,
    user_id: &str,
    push_token: &str,
) -> Result<(), StoreError> {
    if let Some(holder) = store.find_by_push_token(push_token).await? {
        if holder.user_id != user_id {
            log::info!(
                "Push token moving from subscriber {} to {user_id}, clearing previous holder",
                holder.user_id,
            );
            let clear = SubscriberUpdate::clear_token(TOKEN_CLAIMED_REASON.to_string(), Utc::now());
            if let Err(e) = update_or_merge(store, &holder.user_id, clear).await {
                log::warn!(
                    "Failed to clear push token from subscriber {}: {e}",
                    holder.user_id,
                );
            }
        }
    }

    update_or_merge(store, user_id, SubscriberUpdate::token(push_token.to_string())).await
}

/// Persists the subscriber's last known location.
///
/// # Errors
///
/// Returns [`StoreError`] if the write fails.
pub async fn record_location(
    store: &dyn SubscriberStore,
    user_id: &str,
    latitude: f64,
    longitude: f64,
) -> Result<(), StoreError> {
    update_or_merge(store, user_id, SubscriberUpdate::location(latitude, longitude)).await
}

/// Partial update with a merge-create fallback for subscribers the store
/// has never seen.
async fn update_or_merge(
    store: &dyn SubscriberStore,
    user_id: &str,
    update: SubscriberUpdate,
) -> Result<(), StoreError> {
    match store.update(user_id, update.clone()).await {
        Err(StoreError::NotFound { .. }) => {
            log::info!("Subscriber {user_id} not found on update, merge-creating");
            store.merge(user_id, update).await
        }
        other => other,
    }
}
