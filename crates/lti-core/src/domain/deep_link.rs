use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeepLinkingTarget {
    Iframe,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLinkType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "ltiResourceLink")]
    LtiResourceLink,
    #[serde(rename = "image")]
    Image,
}

/// The deep-link request context captured at launch time from the platform's
/// `deep_linking_settings` claim. Signed separately from the session JWT and
/// handed back to the tool at authoring time via a scoped cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkContext {
    pub nonce: String,
    pub return_aud: String,
    pub return_url: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub accept_types: Vec<DeepLinkType>,
    #[serde(default)]
    pub accept_targets: Vec<DeepLinkingTarget>,
    #[serde(default)]
    pub auto_create: bool,
    #[serde(default)]
    pub accept_media_types: String,
    /// `jti` of the session JWT this context is bound to. A deep-link cookie
    /// whose `attached_kid` doesn't match the active session is rejected.
    pub attached_kid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Raw `deep_linking_settings` claim shape, as sent by the platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeepLinkingSettingsClaim {
    #[serde(default)]
    pub deep_link_return_url: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub accept_types: Vec<DeepLinkType>,
    #[serde(default)]
    pub accept_presentation_document_targets: Vec<DeepLinkingTarget>,
    #[serde(default)]
    pub auto_create: bool,
    #[serde(default)]
    pub accept_media_types: String,
}

/// A single content item offered back to the platform in a deep-link reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkItem {
    #[serde(rename = "type")]
    pub item_type: DeepLinkType,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        rename = "presentation_document_target"
    )]
    pub targets: Vec<DeepLinkingTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item: Option<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub label: String,
    pub score_maximum: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}
