//! In-process tenant directory backed by a static table.

use async_trait::async_trait;
use std::collections::HashMap;

use aqchat_core::error::Result;
use aqchat_core::tenant::{TenantDirectory, TenantInfo};

/// A [`TenantDirectory`] over in-process tables.
///
/// Built once at startup from configuration; immutable afterwards.
#[derive(Debug, Default, Clone)]
pub struct StaticTenantDirectory {
    tenants: Vec<TenantInfo>,
    devices: HashMap<String, Vec<String>>,
    domains: HashMap<String, String>,
}

impl StaticTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a visible tenant.
    pub fn with_tenant(mut self, slug: impl Into<String>, name: impl Into<String>) -> Self {
        self.tenants.push(TenantInfo {
            slug_name: slug.into(),
            name: name.into(),
            visible: true,
        });
        self
    }

    /// Registers the device ids owned by a tenant.
    pub fn with_devices(
        mut self,
        slug: impl Into<String>,
        device_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.devices
            .insert(slug.into(), device_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Maps an originating domain to a tenant slug.
    pub fn with_domain_mapping(
        mut self,
        domain: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        let domain: String = domain.into();
        self.domains
            .insert(domain.trim().to_lowercase(), slug.into());
        self
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn tenant_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.tenants.iter().any(|t| t.slug_name == slug))
    }

    async fn tenant_by_slug(&self, slug: &str) -> Result<Option<TenantInfo>> {
        Ok(self.tenants.iter().find(|t| t.slug_name == slug).cloned())
    }

    async fn devices_by_tenant(&self, slug: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .devices
            .get(slug)
            .map(|ids| ids.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn tenant_slug_for_domain(&self, domain: &str) -> Result<Option<String>> {
        Ok(self.domains.get(&domain.trim().to_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticTenantDirectory {
        StaticTenantDirectory::new()
            .with_tenant("akcansa", "Akçansa")
            .with_devices("akcansa", ["dev-1", "dev-2"])
            .with_domain_mapping("Ornek.IO", "akcansa")
    }

    #[tokio::test]
    async fn lookups_resolve_against_the_table() {
        let directory = directory();
        assert!(directory.tenant_exists("akcansa").await.unwrap());
        assert!(!directory.tenant_exists("ghost").await.unwrap());

        let tenant = directory.tenant_by_slug("akcansa").await.unwrap().unwrap();
        assert_eq!(tenant.name, "Akçansa");
    }

    #[tokio::test]
    async fn device_lookup_honors_the_limit() {
        let directory = directory();
        assert_eq!(directory.devices_by_tenant("akcansa", 1).await.unwrap().len(), 1);
        assert!(directory.devices_by_tenant("ghost", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn domain_mapping_is_case_insensitive() {
        let directory = directory();
        assert_eq!(
            directory.tenant_slug_for_domain("ornek.io").await.unwrap().as_deref(),
            Some("akcansa")
        );
        assert!(directory.tenant_slug_for_domain("diger.io").await.unwrap().is_none());
    }
}
