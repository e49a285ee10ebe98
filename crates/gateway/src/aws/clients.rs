//! AWS SDK client bundle.

use anyhow::Result;
use aws_config::BehaviorVersion;

/// Bundle of AWS SDK clients sharing one resolved [`aws_config::SdkConfig`].
#[derive(Clone)]
pub struct AwsClients {
    /// Secrets Manager client used to fetch the encryption key.
    pub secretsmanager: aws_sdk_secretsmanager::Client,
}

impl AwsClients {
    /// Initialise the SDK clients.
    ///
    /// Credentials and region come from the standard AWS provider chain.
    /// `endpoint_url` overrides the service endpoint, e.g. for a local emulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK config cannot be loaded.
    pub async fn init(endpoint_url: Option<&str>) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        let secretsmanager = aws_sdk_secretsmanager::Client::from_conf(builder.build());

        Ok(Self { secretsmanager })
    }
}
