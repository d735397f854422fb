//! LTI 1.3 Advantage tool-provider runtime.
//!
//! The pieces compose as: [`crypto`] mints and verifies tokens, [`store`]
//! holds deployments and short-lived launch state, [`jwks`] resolves a
//! platform's published keys, [`launch`] runs the OIDC-initiation and
//! launch handshake, [`deep_linking`] replies to a captured authoring
//! context, [`impostering`] is the operator-driven session-spoofing side
//! channel, [`session`] gates application routes on a minted session, and
//! [`mux`] assembles all of the above into one [`axum::Router`].

pub mod crypto;
pub mod deep_linking;
pub mod domain;
pub mod error;
pub mod impostering;
pub mod jwks;
pub mod launch;
pub mod mux;
pub mod session;
pub mod store;

pub use error::LtiError;
pub use launch::{Launcher, LauncherBuilder};
