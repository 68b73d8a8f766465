use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let s3_config = s3_builder.build();

        let client = Client::from_conf(s3_config);
        let endpoint = config
            .s3_public_endpoint
            .clone()
            .unwrap_or_else(|| config.s3_endpoint.clone());

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_base_url: public_base_url(&endpoint, &config.s3_bucket),
        })
    }

    pub async fn put_object(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Object key behind a URL built by [`Self::public_url`], or `None` for
    /// URLs pointing elsewhere.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        key_for_url(&self.public_base_url, url)
    }
}

fn key_for_url<'a>(public_base_url: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(public_base_url)?
        .strip_prefix('/')
        .filter(|key| !key.is_empty())
}

fn public_base_url(endpoint: &str, bucket: &str) -> String {
    let endpoint = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
}
