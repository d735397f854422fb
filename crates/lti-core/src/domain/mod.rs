mod deep_link;
mod deployment;
mod jwk;
mod role;
mod session_claims;
mod state;

pub use deep_link::{
    DeepLinkContext, DeepLinkItem, DeepLinkType, DeepLinkingSettingsClaim, DeepLinkingTarget,
    LineItem,
};
pub use deployment::Deployment;
pub use jwk::{Jwk, Jwks};
pub use role::Role;
pub use session_claims::{CourseInfo, LaunchType, SessionClaims, ToolPlatform, UserInfo};
pub use state::LaunchState;
