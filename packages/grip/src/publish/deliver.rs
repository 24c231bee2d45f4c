use serde_json::json;
use tracing::debug;

use super::request::Batch;
use crate::error::PublishError;
use crate::token::make_token;

/// POST one batch to its control endpoint.
///
/// Sends `Authorization: Bearer <jwt>` when the batch carries a realm.
pub async fn send_batch(client: &reqwest::Client, batch: &Batch) -> Result<(), PublishError> {
    let mut request = client
        .post(batch.endpoint())
        .json(&json!({ "items": batch.items }));

    if let Some(realm) = batch.realm.as_deref().filter(|r| !r.is_empty()) {
        let token = make_token(realm, batch.secret.as_deref().unwrap_or_default())?;
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PublishError::Status(status.as_u16()));
    }

    debug!(
        "published {} item(s) to {}/{}",
        batch.items.len(),
        batch.uri,
        batch.channel
    );
    Ok(())
}
