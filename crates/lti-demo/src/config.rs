use std::net::SocketAddr;

use clap::Parser;

/// `client_id,deployment_id,issuer,jwks_url,auth_endpoint`, used to seed the
/// demo's in-memory deployment registry without a database. Comma-separated
/// rather than colon-separated since `issuer`, `jwks_url`, and
/// `auth_endpoint` are URLs and a `:` delimiter can't tell a field boundary
/// from the `:` in `https://` or a port number.
#[derive(Debug, Clone)]
pub struct SeedDeployment {
    pub client_id: String,
    pub deployment_id: String,
    pub issuer: String,
    pub jwks_url: String,
    pub auth_endpoint: String,
}

impl std::str::FromStr for SeedDeployment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(5, ',').collect();
        let [client_id, deployment_id, issuer, jwks_url, auth_endpoint] = parts.as_slice() else {
            return Err(
                "--deployment expects client_id,deployment_id,issuer,jwks_url,auth_endpoint".into(),
            );
        };
        Ok(Self {
            client_id: (*client_id).to_string(),
            deployment_id: (*deployment_id).to_string(),
            issuer: (*issuer).to_string(),
            jwks_url: (*jwks_url).to_string(),
            auth_endpoint: (*auth_endpoint).to_string(),
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "lti-tool-demo", about = "Runnable demo embedding lti-tool-core")]
pub struct Config {
    #[arg(long, env = "LTI_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    #[arg(long, env = "LTI_BASE_URL")]
    pub base_url: String,

    #[arg(long, env = "LTI_ISSUER")]
    pub issuer: String,

    #[arg(long = "audience", env = "LTI_AUDIENCE", value_delimiter = ',')]
    pub audience: Vec<String>,

    #[arg(long, env = "LTI_HMAC_SECRET")]
    pub hmac_secret: String,

    #[arg(long = "deployment")]
    pub deployments: Vec<SeedDeployment>,
}
