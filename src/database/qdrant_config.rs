use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;

/// Normalizes a REST-style Qdrant URL into the gRPC endpoint the client speaks.
pub fn grpc_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };
    let rest = rest.trim_end_matches('/');

    // Replace port 6333 with 6334 for gRPC if needed
    let rest = match rest.strip_suffix(":6333") {
        Some(host) => format!("{}:6334", host),
        None => rest.to_string(),
    };

    format!("{}://{}", scheme, rest)
}

pub async fn create_qdrant_client(
    url: &str,
    api_key: Option<&str>,
) -> Result<Qdrant, Box<dyn std::error::Error + Send + Sync>> {
    let endpoint = grpc_url(url);
    log::info!("Attempting to connect to Qdrant with URL: {}", endpoint);

    let mut config = QdrantConfig::from_url(&endpoint);
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);
    if let Some(key) = api_key {
        config.set_api_key(key);
    }

    let client = Qdrant::new(config)?;

    // Test the connection
    match client.list_collections().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(format!("Failed to connect to Qdrant: {}", e).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_url_rewrites_rest_port() {
        assert_eq!(grpc_url("http://localhost:6333"), "http://localhost:6334");
        assert_eq!(grpc_url("localhost:6333/"), "http://localhost:6334");
    }

    #[test]
    fn test_grpc_url_keeps_cloud_endpoints() {
        assert_eq!(
            grpc_url("https://abc.eu-central-1.aws.cloud.qdrant.io:6334"),
            "https://abc.eu-central-1.aws.cloud.qdrant.io:6334"
        );
    }
}
