//! Platform service binding resolution.
//!
//! The platform injects two JSON documents into the environment:
//! `VCAP_APPLICATION` (who we are) and `VCAP_SERVICES` (what is bound to
//! us, keyed by service label).  [`PlatformEnv`] parses both once at
//! startup; [`resolve`] picks the blob service out of it and turns its
//! credential map into a flat [`BindingConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::config::BindingSettings;
use crate::errors::BindingError;

/// Credential key holding the access key id.
pub const ACCESS_KEY_ID: &str = "access_key_id";
/// Credential key holding the secret access key.
pub const SECRET_ACCESS_KEY: &str = "secret_access_key";
/// Credential key holding the bucket URL.
pub const BUCKET_URL: &str = "url";
/// Credential key holding the bucket name.
pub const BUCKET_NAME: &str = "bucket_name";
/// Credential key holding the storage endpoint host.
pub const HOST: &str = "host";

/// `VCAP_APPLICATION`, reduced to the fields we report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationEnv {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub application_uris: Vec<String>,
}

impl ApplicationEnv {
    /// The application name, whichever key the platform used.
    pub fn app_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.application_name.as_deref())
            .unwrap_or_default()
    }
}

/// One bound service instance from `VCAP_SERVICES`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInstance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub credentials: serde_json::Map<String, serde_json::Value>,
}

/// Parsed platform environment.
#[derive(Debug, Clone, Default)]
pub struct PlatformEnv {
    pub application: ApplicationEnv,
    /// Bound services, keyed by service label.
    pub services: BTreeMap<String, Vec<ServiceInstance>>,
}

impl PlatformEnv {
    /// Read the platform environment from the process environment.
    pub fn from_env() -> Result<Self, BindingError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the platform environment through `lookup`.
    ///
    /// Unset or blank variables parse as empty documents.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BindingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let application = match lookup("VCAP_APPLICATION").filter(|v| !v.trim().is_empty()) {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| BindingError::MalformedEnv {
                var: "VCAP_APPLICATION",
                source,
            })?,
            None => ApplicationEnv::default(),
        };

        let services = match lookup("VCAP_SERVICES").filter(|v| !v.trim().is_empty()) {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| BindingError::MalformedEnv {
                var: "VCAP_SERVICES",
                source,
            })?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            application,
            services,
        })
    }

    /// All bound instances carrying `label`.
    ///
    /// Instances listed under the `label` key come first, followed by
    /// instances filed elsewhere whose own `label` field matches.
    pub fn services_with_label(&self, label: &str) -> Vec<&ServiceInstance> {
        let mut found: Vec<&ServiceInstance> = self
            .services
            .get(label)
            .map(|instances| instances.iter().collect())
            .unwrap_or_default();
        for (key, instances) in &self.services {
            if key == label {
                continue;
            }
            found.extend(instances.iter().filter(|s| s.label == label));
        }
        found
    }

    /// Whether the platform bound any service at all.
    pub fn has_services(&self) -> bool {
        self.services.values().any(|instances| !instances.is_empty())
    }
}

/// Connection parameters for the bound blob service.
#[derive(Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Name of the service instance the credentials came from.
    pub service_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Storage endpoint, with or without scheme.
    pub endpoint_host: String,
    pub bucket_url: String,
    pub bucket_name: String,
    pub region: String,
}

impl fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingConfig")
            .field("service_name", &self.service_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint_host", &self.endpoint_host)
            .field("bucket_url", &self.bucket_url)
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

/// Outcome of binding resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Bound(BindingConfig),
    /// The platform bound no services at all.
    Unbound,
}

impl Binding {
    pub fn config(&self) -> Option<&BindingConfig> {
        match self {
            Binding::Bound(config) => Some(config),
            Binding::Unbound => None,
        }
    }
}

/// Resolve the blob service binding labelled `label`.
///
/// With no services bound the result is [`Binding::Unbound`] and the
/// service keeps running.  Services without a `label` match, or a match
/// with incomplete credentials, are errors the caller treats as fatal.
pub fn resolve(platform: &PlatformEnv, label: &str, region: &str) -> Result<Binding, BindingError> {
    if !platform.has_services() {
        info!("No services bound; running unbound");
        return Ok(Binding::Unbound);
    }

    let matches = platform.services_with_label(label);
    for service in &matches {
        info!(service = %service.name, plan = %service.plan, "Found {} service", label);
    }

    let service = matches
        .first()
        .ok_or_else(|| BindingError::NoMatchingService {
            label: label.to_string(),
        })?;

    let config = BindingConfig {
        service_name: service.name.clone(),
        access_key_id: credential(service, ACCESS_KEY_ID)?,
        secret_access_key: credential(service, SECRET_ACCESS_KEY)?,
        endpoint_host: credential(service, HOST)?,
        bucket_url: credential(service, BUCKET_URL)?,
        bucket_name: credential(service, BUCKET_NAME)?,
        region: region.to_string(),
    };
    debug!(binding = ?config, "Resolved blob binding");

    Ok(Binding::Bound(config))
}

fn credential(service: &ServiceInstance, key: &'static str) -> Result<String, BindingError> {
    match service.credentials.get(key) {
        Some(serde_json::Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        Some(serde_json::Value::String(_)) | None => Err(BindingError::MissingCredential {
            service: service.name.clone(),
            key,
        }),
        Some(_) => Err(BindingError::InvalidCredential {
            service: service.name.clone(),
            key,
        }),
    }
}

/// What `/info` reports about this deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub app_name: String,
    pub app_uri: String,
    pub service_name: String,
    pub plan_name: String,
}

impl ServiceDescriptor {
    pub fn from_platform(platform: &PlatformEnv, settings: &BindingSettings) -> Self {
        Self {
            app_name: platform.application.app_name().to_string(),
            app_uri: platform
                .application
                .application_uris
                .first()
                .cloned()
                .unwrap_or_default(),
            service_name: settings.service_label.clone(),
            plan_name: settings.service_plan.clone(),
        }
    }
}
