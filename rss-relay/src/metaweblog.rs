use crate::publisher::TargetClient;
use crate::traits::BlogClient;
use crate::types::{FetchConfig, PostPayload, RelayError, Result, Target};
use crate::xmlrpc::{self, Value};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

pub const NEW_POST_METHOD: &str = "metaWeblog.newPost";

/// XML-RPC client for a single MetaWeblog endpoint.
#[derive(Debug, Clone)]
pub struct MetaWeblogClient {
    client: Client,
    endpoint: Url,
}

impl MetaWeblogClient {
    pub fn new(endpoint: &str, config: &FetchConfig) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !crate::utils::url::is_http(&endpoint) {
            return Err(RelayError::Config(format!(
                "unsupported scheme for XML-RPC endpoint: {}",
                endpoint
            )));
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, endpoint })
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        let body = xmlrpc::encode_method_call(method, params)?;
        debug!("Calling {} on {}", method, self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::XmlRpc(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content = response.bytes().await?;
        xmlrpc::decode_response(&content)
    }
}

#[async_trait]
impl BlogClient for MetaWeblogClient {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn new_post(
        &self,
        blog_id: &str,
        user_id: &str,
        password: &str,
        payload: &PostPayload,
        publish: bool,
    ) -> Result<String> {
        let mut members = vec![
            ("title".to_string(), Value::from(payload.title.as_str())),
            (
                "description".to_string(),
                Value::from(payload.description.as_str()),
            ),
        ];
        if let Some(categories) = &payload.categories {
            members.push((
                "categories".to_string(),
                Value::Array(categories.iter().map(|c| Value::from(c.as_str())).collect()),
            ));
        }

        let params = [
            Value::from(blog_id),
            Value::from(user_id),
            Value::from(password),
            Value::Struct(members),
            Value::from(publish),
        ];

        let post_id = self.call(NEW_POST_METHOD, &params).await?;
        Ok(post_id.to_plain_string())
    }
}

/// Build one client per target. Targets whose endpoint is unusable are
/// logged and left out; an empty result means there is nothing to publish to.
pub fn connect_targets(targets: &[Target], config: &FetchConfig) -> Vec<TargetClient> {
    targets
        .iter()
        .filter_map(|target| match MetaWeblogClient::new(&target.url, config) {
            Ok(client) => {
                info!("{}: initialized XML-RPC connection {}", target.id, target.url);
                Some(TargetClient::new(target.clone(), Box::new(client)))
            }
            Err(e) => {
                error!("{}: cannot use endpoint {}: {}", target.id, target.url, e);
                None
            }
        })
        .collect()
}
