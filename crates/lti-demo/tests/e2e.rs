//! Drives the compiled demo binary as a real spawned server process and
//! exercises the OIDC-initiation -> launch handshake over HTTP, the way the
//! corpus's own end-to-end tests spawn a server and poll it rather than
//! calling handlers in-process.

use std::process::{Command, Stdio};
use std::time::Duration;

use lti_tool_core::crypto::{AsymmetricSigner, Es256Signer, Signer as _};
use lti_tool_testsupport::{KillOnDrop, fake_deployment, pick_unused_port, wait_http_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn platform_pem() -> String {
    use elliptic_curve::pkcs8::EncodePrivateKey as _;
    let secret = p256::SecretKey::random(&mut rand::thread_rng());
    secret.to_pkcs8_pem(elliptic_curve::pkcs8::LineEnding::LF).unwrap().to_string()
}

#[tokio::test]
async fn resource_link_launch_through_a_spawned_server() {
    let mock_server = MockServer::start().await;
    let platform_signer =
        Es256Signer::from_pkcs8_pem("platform-kid", "https://platform.example", &platform_pem())
            .expect("build platform signer");

    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(AsymmetricSigner::jwks(&platform_signer)))
        .mount(&mock_server)
        .await;

    let deployment = fake_deployment("client-1", "deployment-1", "https://platform.example");
    let port = pick_unused_port().expect("pick an unused port");
    let bind = format!("127.0.0.1:{port}");
    let deployment_flag = format!(
        "{},{},{},{}/jwks,{}",
        deployment.client_id, deployment.deployment_id, deployment.issuer, mock_server.uri(), deployment.auth_endpoint
    );

    let child = Command::new(env!("CARGO_BIN_EXE_lti-tool-demo"))
        .args(["--bind", &bind])
        .args(["--base-url", "https://tool.example"])
        .args(["--issuer", "tool.example"])
        .args(["--audience", "tool-aud"])
        .args(["--hmac-secret", "a-server-spawned-secret-at-least-32-bytes"])
        .args(["--deployment", &deployment_flag])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lti-tool-demo");
    let _guard = KillOnDrop(child);

    let base = format!("http://{bind}");
    wait_http_ok(&format!("{base}/lti/.well-known/jwks.json"), Duration::from_secs(5))
        .await
        .expect("server came up");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("build client");

    let oidc_resp = client
        .post(format!("{base}/lti/1.3/oidc"))
        .form(&[
            ("iss", deployment.issuer.as_str()),
            ("client_id", deployment.client_id.as_str()),
            ("lti_deployment_id", deployment.deployment_id.as_str()),
            ("login_hint", "user-1"),
            ("target_link_uri", "https://tool.example/lti/app/course/1"),
        ])
        .send()
        .await
        .expect("oidc request");
    assert_eq!(oidc_resp.status(), reqwest::StatusCode::FOUND);
    let location = oidc_resp
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect has a location")
        .to_str()
        .unwrap()
        .to_string();

    let url = reqwest::Url::parse(&location).expect("redirect is a valid url");
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    let state = query.get("state").expect("state present").clone();
    let nonce = query.get("nonce").expect("nonce present").clone();

    let id_token_claims = serde_json::json!({
        "aud": deployment.client_id,
        "nonce": nonce,
        "sub": "user-1",
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

    let launch_resp = client
        .post(format!("{base}/lti/1.3/launch"))
        .form(&[("id_token", id_token.as_str()), ("state", state.as_str())])
        .send()
        .await
        .expect("launch request");
    assert_eq!(launch_resp.status(), reqwest::StatusCode::FOUND);

    let session_cookie_set = launch_resp
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap_or("").starts_with("lti_session="));
    assert!(session_cookie_set, "launch must set the lti_session cookie");

    let replay = client
        .post(format!("{base}/lti/1.3/launch"))
        .form(&[("id_token", id_token.as_str()), ("state", state.as_str())])
        .send()
        .await
        .expect("replayed launch request");
    assert!(replay.status().is_client_error(), "launch state is single-use, got {}", replay.status());
}
