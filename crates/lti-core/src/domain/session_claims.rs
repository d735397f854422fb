use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::role::Role;

/// What kind of LTI message produced this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchType {
    ResourceLink,
    DeepLinking,
}

impl LaunchType {
    #[must_use]
    pub fn from_message_type(message_type: &str) -> Option<Self> {
        match message_type {
            "LtiResourceLinkRequest" => Some(Self::ResourceLink),
            "LtiDeepLinkingRequest" => Some(Self::DeepLinking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// The platform instance that originated the launch, from the
/// `https://purl.imsglobal.org/spec/lti/claim/tool_platform` claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPlatform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_family_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Internal, tool-issued JWT payload minted after a successful LTI launch or
/// impostering handoff. Carries everything downstream handlers need without
/// re-parsing the platform's `id_token`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub tenant_id: String,
    pub deployment_id: String,
    pub client_id: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(default)]
    pub course_info: CourseInfo,
    #[serde(default)]
    pub launch_type: Option<LaunchType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<ToolPlatform>,
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub impostering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impostering_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imposter_launch_redirect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl SessionClaims {
    #[must_use]
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        required.is_empty() || self.roles.iter().any(|r| required.contains(r))
    }

    #[must_use]
    pub fn audience_intersects(&self, allowed: &[String]) -> bool {
        allowed.is_empty() || self.aud.iter().any(|a| allowed.contains(a))
    }
}
