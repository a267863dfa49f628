//! Configuration for reaching the managed stream service.
//!
//! The wire client itself is supplied by the embedding application through a
//! [`TransportConnector`]; this module resolves credentials, region and
//! endpoint and hands them over.

use std::{fmt::Debug, str::FromStr, sync::Arc};

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{StreamTransport, TransportError};
use crate::error::BuildError;

/// Regions the stream service is offered in.
pub const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Static access credentials. The secret is redacted from debug output.
#[derive(Debug, Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: SecretString,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }
}

/// A known service region and its default endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    name: String,
    endpoint: Url,
}

impl Region {
    pub fn new(name: &str) -> Result<Self, BuildError> {
        let unknown = || BuildError::UnknownRegion {
            region: name.to_string(),
        };

        if !KNOWN_REGIONS.contains(&name) {
            return Err(unknown());
        }

        // The China partition is served from its own domain.
        let domain = if name.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };
        let endpoint = Url::parse(&format!("https://kinesis.{name}.{domain}")).map_err(|_| unknown())?;

        Ok(Self {
            name: name.to_string(),
            endpoint,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl FromStr for Region {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Everything a connector needs to open a client to the stream service.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub credentials: Credentials,
    pub region: Region,
    pub url: Url,
}

/// Builds the client for the managed stream service.
pub trait TransportConnector: Debug + Send + Sync + 'static {
    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn StreamTransport>, TransportError>;
}

/// Settings for a publisher talking to the managed stream service.
#[derive(Debug, Clone, Default)]
pub struct RemoteTransportConfig {
    credentials: Option<Credentials>,
    region: Option<String>,
    endpoint: Option<Url>,
    connector: Option<Arc<dyn TransportConnector>>,
}

impl RemoteTransportConfig {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector: Some(connector),
            ..Default::default()
        }
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..self
        }
    }

    pub fn with_region(self, region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..self
        }
    }

    /// Override the region's default endpoint.
    pub fn with_endpoint(self, endpoint: Url) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..self
        }
    }

    pub fn with_connector(self, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector: Some(connector),
            ..self
        }
    }

    /// Resolve credentials, region and endpoint.
    pub fn endpoint(&self) -> Result<RemoteEndpoint, BuildError> {
        let credentials = self
            .credentials
            .clone()
            .ok_or(BuildError::MissingCredentials)?;
        let region = Region::new(self.region.as_deref().ok_or(BuildError::MissingRegion)?)?;
        let url = self
            .endpoint
            .clone()
            .unwrap_or_else(|| region.endpoint().clone());

        Ok(RemoteEndpoint {
            credentials,
            region,
            url,
        })
    }

    pub(crate) fn connect(&self) -> Result<Arc<dyn StreamTransport>, BuildError> {
        let endpoint = self.endpoint()?;
        let connector = self.connector.as_ref().ok_or(BuildError::MissingConnector)?;
        connector.connect(&endpoint).map_err(BuildError::Connect)
    }
}
