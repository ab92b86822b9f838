//! Gmail message and label operations
//!
//! All calls go through an `AuthorizedClient` rooted at the user's API base
//! (`.../gmail/v1/users/me`).

use futures::future::try_join_all;

use super::client::AuthorizedClient;
use crate::error::{Error, Result};
use crate::models::{
    Label, ListLabelsResponse, ListMessagesResponse, Message, MessageRef, ModifyRequest, NewLabel,
};

pub const INBOX: &str = "INBOX";
pub const UNREAD: &str = "UNREAD";

/// References to unread messages in the inbox, in provider order.
pub async fn list_unread(client: &AuthorizedClient) -> Result<Vec<MessageRef>> {
    let resp: ListMessagesResponse = client
        .get_json("/messages", &[("labelIds", INBOX), ("labelIds", UNREAD)])
        .await?;

    let refs = unread_refs(resp);
    tracing::debug!("{} unread message(s)", refs.len());
    Ok(refs)
}

/// Normalize a list response.
///
/// Gmail omits `messages` entirely, rather than sending `[]`, when nothing
/// matches. A zero `resultSizeEstimate` is the authoritative "no results"
/// signal; whatever `messages` holds in that case is ignored.
fn unread_refs(resp: ListMessagesResponse) -> Vec<MessageRef> {
    if resp.result_size_estimate == Some(0) {
        return Vec::new();
    }
    resp.messages.unwrap_or_default()
}

/// Full content of one message. `NotFound` if the id no longer exists.
pub async fn get_message(client: &AuthorizedClient, id: &str) -> Result<Message> {
    client
        .get_json(&format!("/messages/{}", id), &[("format", "full")])
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("message {}", id)),
            other => other,
        })
}

/// Fetch all `refs` concurrently; output order matches input order.
///
/// Fails as a whole on the first error.
pub async fn get_messages(client: &AuthorizedClient, refs: &[MessageRef]) -> Result<Vec<Message>> {
    try_join_all(refs.iter().map(|r| get_message(client, &r.id))).await
}

async fn modify(client: &AuthorizedClient, id: &str, request: &ModifyRequest) -> Result<Message> {
    client
        .post_json(&format!("/messages/{}/modify", id), request)
        .await
}

/// Remove INBOX and UNREAD from a message; other labels stay.
///
/// Removing labels that are already gone succeeds, so this is idempotent.
pub async fn archive_message(client: &AuthorizedClient, id: &str) -> Result<()> {
    let request = ModifyRequest {
        remove_label_ids: vec![INBOX.to_string(), UNREAD.to_string()],
        ..Default::default()
    };
    modify(client, id, &request).await?;
    tracing::debug!("Archived {}", id);
    Ok(())
}

pub async fn add_label(client: &AuthorizedClient, id: &str, label_id: &str) -> Result<()> {
    let request = ModifyRequest {
        add_label_ids: vec![label_id.to_string()],
        ..Default::default()
    };
    modify(client, id, &request).await?;
    Ok(())
}

pub async fn list_labels(client: &AuthorizedClient) -> Result<Vec<Label>> {
    let resp: ListLabelsResponse = client.get_json("/labels", &[]).await?;
    Ok(resp.labels.unwrap_or_default())
}

/// Return the label called `name`, creating it hidden if it does not exist.
///
/// Two callers racing on the same new name can both create it.
pub async fn ensure_label(client: &AuthorizedClient, name: &str) -> Result<Label> {
    let existing = list_labels(client)
        .await?
        .into_iter()
        .find(|label| label.name == name);
    if let Some(label) = existing {
        return Ok(label);
    }

    tracing::info!("Creating hidden label '{}'", name);
    client.post_json("/labels", &NewLabel::hidden(name)).await
}
