//! Label-related models

use serde::{Deserialize, Serialize};

/// Whether a label shows up in the label list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelListVisibility {
    LabelShow,
    LabelShowIfUnread,
    LabelHide,
}

/// Whether a label is displayed on messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageListVisibility {
    Show,
    Hide,
}

/// Gmail label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    /// `system` or `user`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_list_visibility: Option<LabelListVisibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_list_visibility: Option<MessageListVisibility>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLabelsResponse {
    pub labels: Option<Vec<Label>>,
}

/// Body of the label create call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel<'a> {
    pub name: &'a str,
    pub label_list_visibility: LabelListVisibility,
    pub message_list_visibility: MessageListVisibility,
}

impl<'a> NewLabel<'a> {
    /// Label excluded from both the label list and per-message display.
    pub fn hidden(name: &'a str) -> Self {
        Self {
            name,
            label_list_visibility: LabelListVisibility::LabelHide,
            message_list_visibility: MessageListVisibility::Hide,
        }
    }
}
