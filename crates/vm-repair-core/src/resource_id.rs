//! Parsing of ARM resource IDs and storage blob URIs.

use std::str::FromStr;

use reqwest::Url;

use crate::error::RepairError;

/// An Azure Resource Manager resource ID.
///
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    subscription: String,
    resource_group: String,
    namespace: String,
    resource_type: String,
    name: String,
}

impl ResourceId {
    /// ID of a virtual machine.
    pub fn virtual_machine(subscription: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription: subscription.to_string(),
            resource_group: resource_group.to_string(),
            namespace: "Microsoft.Compute".to_string(),
            resource_type: "virtualMachines".to_string(),
            name: name.to_string(),
        }
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for ResourceId {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RepairError::InvalidArgument(format!("'{s}' is not a valid resource ID"));
        let parts: Vec<&str> = s.split('/').filter(|p| !p.is_empty()).collect();

        // subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}
        if parts.len() < 7
            || !parts[0].eq_ignore_ascii_case("subscriptions")
            || !parts[2].eq_ignore_ascii_case("resourceGroups")
            || !parts[4].eq_ignore_ascii_case("providers")
        {
            return Err(invalid());
        }

        Ok(Self {
            subscription: parts[1].to_string(),
            resource_group: parts[3].to_string(),
            namespace: parts[5].to_string(),
            resource_type: parts[6].to_string(),
            name: parts.get(7).ok_or_else(invalid)?.to_string(),
        })
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription, self.resource_group, self.namespace, self.resource_type, self.name
        )
    }
}

/// A blob in an Azure storage account, e.g. an unmanaged VHD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUri {
    url: Url,
    account_name: String,
    container: String,
    blob: String,
}

impl BlobUri {
    pub fn parse(uri: &str) -> Result<Self, RepairError> {
        let malformed =
            |why: &str| RepairError::Unexpected(format!("malformed blob URI '{uri}': {why}"));
        let url = Url::parse(uri).map_err(|e| malformed(&e.to_string()))?;

        let account_name = url
            .host_str()
            .and_then(|h| h.split('.').next())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| malformed("no storage account host"))?
            .to_string();

        let path = url.path().trim_start_matches('/');
        let (container, blob) = path
            .split_once('/')
            .filter(|(c, b)| !c.is_empty() && !b.is_empty())
            .ok_or_else(|| malformed("expected /<container>/<blob>"))?;

        Ok(Self {
            account_name,
            container: container.to_string(),
            blob: blob.to_string(),
            url,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn blob(&self) -> &str {
        &self.blob
    }

    /// URI of another blob in the same container.
    pub fn sibling(&self, blob: &str) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_path(&format!("/{}/{}", self.container, blob));
        url.to_string()
    }
}
