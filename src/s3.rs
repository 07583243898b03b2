use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client as S3Client,
};
use tracing::info;

use crate::config::AppConfig;
use crate::storage::S3Storage;

/// Builds the document store for the configured bucket.
pub async fn connect(config: &AppConfig) -> Result<S3Storage> {
    let client = build_client(config).await?;
    info!(
        bucket = %config.s3_bucket,
        region = %config.aws_region,
        endpoint = config.aws_endpoint_url.as_deref().unwrap_or("aws"),
        "object storage configured"
    );
    Ok(S3Storage::new(client, config.s3_bucket.clone()))
}

async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let region_provider =
        RegionProviderChain::first_try(Some(Region::new(config.aws_region.clone())))
            .or_default_provider()
            .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    // Static keys win over the default chain when both are configured.
    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "orgdocs-env");
        loader = loader.credentials_provider(credentials);
    }

    let shared = loader.load().await;
    // MinIO and other S3-compatible endpoints need path-style addressing.
    let s3_config = S3ConfigBuilder::from(&shared)
        .force_path_style(config.aws_endpoint_url.is_some())
        .build();

    Ok(S3Client::from_conf(s3_config))
}
