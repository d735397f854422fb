//! End-to-end coverage of the OIDC-initiation → launch handshake against a
//! mocked platform: a wiremock server stands in for the platform's JWKS
//! endpoint, an `Es256Signer` stands in for the platform's signing key, and
//! an `HmacSigner` is the tool's own session signer.

use std::sync::Arc;
use std::time::Duration;

use lti_tool_core::crypto::{Es256Signer, HmacSigner, Signer as _};
use lti_tool_core::domain::{Deployment, Role};
use lti_tool_core::launch::{LaunchOutcome, LaunchRequest, Launcher, OidcRequest};
use lti_tool_core::store::{InMemoryStore, Registry as _};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLATFORM_ISSUER: &str = "https://platform.example";
const CLIENT_ID: &str = "client-1";
const DEPLOYMENT_ID: &str = "deployment-1";

fn platform_pem() -> String {
    use elliptic_curve::pkcs8::EncodePrivateKey as _;
    let secret = p256::SecretKey::random(&mut rand::thread_rng());
    secret.to_pkcs8_pem(elliptic_curve::pkcs8::LineEnding::LF).unwrap().to_string()
}

async fn launcher_with_deployment(jwks_url: String, auth_endpoint: String) -> Launcher {
    let store = Arc::new(InMemoryStore::new());
    store
        .add_deployment(Deployment {
            internal_id: "dep-1".into(),
            tenant_id: "tenant-1".into(),
            issuer: PLATFORM_ISSUER.into(),
            client_id: CLIENT_ID.into(),
            deployment_id: DEPLOYMENT_ID.into(),
            jwks_url,
            auth_endpoint,
            token_endpoint: format!("{PLATFORM_ISSUER}/token"),
        })
        .await
        .unwrap();

    let signer: Arc<dyn lti_tool_core::crypto::SignerVerifier> =
        Arc::new(HmacSigner::new("kid-session", b"session-secret-at-least-32-bytes".to_vec(), "tool.example"));

    Launcher::builder()
        .with_base_url("https://tool.example")
        .with_audience(vec!["tool-aud".into()])
        .with_signer(signer)
        .with_store(store)
        .with_deep_linking_enabled(true)
        .build()
        .expect("builds")
}

#[tokio::test]
async fn resource_link_launch_mints_a_session_with_roles() {
    let mock_server = MockServer::start().await;
    let platform_signer =
        Es256Signer::from_pkcs8_pem("platform-kid", PLATFORM_ISSUER, &platform_pem()).expect("build platform signer");

    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::to_value(lti_tool_core::crypto::AsymmetricSigner::jwks(&platform_signer)).unwrap(),
        ))
        .mount(&mock_server)
        .await;

    let launcher = launcher_with_deployment(
        format!("{}/jwks", mock_server.uri()),
        format!("{PLATFORM_ISSUER}/auth"),
    )
    .await;

    let redirect = launcher
        .handle_oidc(&OidcRequest {
            iss: PLATFORM_ISSUER.into(),
            client_id: CLIENT_ID.into(),
            lti_deployment_id: DEPLOYMENT_ID.into(),
            login_hint: "user-1".into(),
            target_link_uri: "https://tool.example/lti/app/course/1".into(),
            lti_message_hint: None,
        })
        .await
        .expect("handle_oidc");

    let url = reqwest::Url::parse(&redirect).unwrap();
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    let state = query.get("state").expect("state present").clone();
    let nonce = query.get("nonce").expect("nonce present").clone();

    let id_token_claims = serde_json::json!({
        "aud": CLIENT_ID,
        "nonce": nonce,
        "sub": "user-1",
        "name": "Ada Lovelace",
        "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
        "https://purl.imsglobal.org/spec/lti/claim/context": {
            "id": "course-1", "label": "CS101", "title": "Intro to CS"
        },
        "https://purl.imsglobal.org/spec/lti/claim/roles": [
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor"
        ],
        "https://purl.imsglobal.org/spec/lti/claim/resource_link": {"id": "rl-1"},
    });
    let id_token = platform_signer.sign(id_token_claims, Duration::from_secs(300)).await.unwrap();

    let outcome = launcher
        .handle_launch(&LaunchRequest { id_token, state })
        .await
        .expect("handle_launch");

    match outcome {
        LaunchOutcome::Session { session_token, claims } => {
            assert_eq!(claims.roles, vec![Role::MembershipInstructor]);
            assert_eq!(claims.linked_resource_id.as_deref(), Some("rl-1"));
            assert_eq!(claims.tenant_id, "tenant-1");
            assert!(session_token.split('.').count() == 3);
        }
        LaunchOutcome::DeepLinkCapture { .. } => panic!("expected a plain session, not a deep link capture"),
    }
}

#[tokio::test]
async fn reusing_a_launch_state_fails_the_second_time() {
    let mock_server = MockServer::start().await;
    let platform_signer =
        Es256Signer::from_pkcs8_pem("platform-kid", PLATFORM_ISSUER, &platform_pem()).expect("build platform signer");

    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::to_value(lti_tool_core::crypto::AsymmetricSigner::jwks(&platform_signer)).unwrap(),
        ))
        .mount(&mock_server)
        .await;

    let launcher = launcher_with_deployment(
        format!("{}/jwks", mock_server.uri()),
        format!("{PLATFORM_ISSUER}/auth"),
    )
    .await;

    let redirect = launcher
        .handle_oidc(&OidcRequest {
            iss: PLATFORM_ISSUER.into(),
            client_id: CLIENT_ID.into(),
            lti_deployment_id: DEPLOYMENT_ID.into(),
            login_hint: "user-1".into(),
            target_link_uri: "https://tool.example/lti/app/course/1".into(),
            lti_message_hint: None,
        })
        .await
        .expect("handle_oidc");
    let url = reqwest::Url::parse(&redirect).unwrap();
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    let state = query.get("state").unwrap().clone();
    let nonce = query.get("nonce").unwrap().clone();

    let claims = serde_json::json!({
        "aud": CLIENT_ID,
        "nonce": nonce,
        "sub": "user-1",
        "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
    });
    let id_token = platform_signer.sign(claims, Duration::from_secs(300)).await.unwrap();

    launcher
        .handle_launch(&LaunchRequest { id_token: id_token.clone(), state: state.clone() })
        .await
        .expect("first launch succeeds");

    let second = launcher.handle_launch(&LaunchRequest { id_token, state }).await;
    assert!(second.is_err(), "state must be single-use");
}

#[tokio::test]
async fn a_launcher_backed_by_an_hmac_session_signer_publishes_no_jwks() {
    let launcher = launcher_with_deployment("https://platform.example/jwks".into(), "https://platform.example/auth".into()).await;
    assert!(launcher.jwks().keys.is_empty());
}
