//! Tenant identity resolution.
//!
//! A tenant is a customer/organization namespace owning devices and
//! analyses. Turns arrive with at most fragmentary identity signals, so
//! [`TenantResolver`] tries four ranked sources and stops at the first one
//! the external directory confirms. Unresolved is a normal outcome, not an
//! error; the orchestrator asks a clarifying question instead.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::extract::extract_tenant_name;
use crate::text::normalize;

/// Directory record for a tenant, read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    /// Normalized, URL-safe identifier.
    pub slug_name: String,
    /// Display name.
    pub name: String,
    /// Whether the tenant is visible to end users.
    pub visible: bool,
}

/// External tenant/device directory.
///
/// Used only for existence checks, name-to-slug disambiguation, device
/// lookup, and domain mapping. Implementations own their consistency.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Returns whether a tenant with the given slug exists.
    async fn tenant_exists(&self, slug: &str) -> Result<bool>;

    /// Fetches a tenant record by slug.
    async fn tenant_by_slug(&self, slug: &str) -> Result<Option<TenantInfo>>;

    /// Lists device ids owned by the tenant, capped at `limit`.
    async fn devices_by_tenant(&self, slug: &str, limit: usize) -> Result<Vec<String>>;

    /// Maps an originating domain to a tenant slug, if a mapping exists.
    async fn tenant_slug_for_domain(&self, domain: &str) -> Result<Option<String>>;
}

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

static SLUG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z0-9]+(?:-[a-z0-9]+)*)\b").unwrap());

/// Converts arbitrary input to slug form: lowercase, Turkish diacritics
/// folded, whitespace runs collapsed to single hyphens, characters outside
/// `[a-z0-9-]` stripped, hyphen runs collapsed, edge hyphens trimmed.
///
/// Idempotent; the same contract is applied to request-supplied slugs and
/// to display names.
pub fn slugify(input: &str) -> String {
    let s = normalize(input.trim());
    let s = WHITESPACE_RUN.replace_all(&s, "-");
    let s = NON_SLUG_CHARS.replace_all(&s, "");
    let s = HYPHEN_RUN.replace_all(&s, "-");
    s.trim_matches('-').to_string()
}

/// Identity signals available when resolving the tenant for one turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantSignals<'a> {
    /// Tenant slug supplied explicitly on the request.
    pub explicit_slug: Option<&'a str>,
    /// Tenant remembered in the sticky conversation context.
    pub context_tenant: Option<&'a str>,
    /// Originating domain of the session.
    pub domain: Option<&'a str>,
    /// Raw message text for last-resort scanning.
    pub message: &'a str,
}

/// Resolves a tenant identifier from ranked sources, consulting the
/// directory for existence checks.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    /// Tries each source in fixed priority and stops at the first one the
    /// directory confirms:
    ///
    /// 1. explicit request slug (normalized, existence-checked);
    /// 2. sticky context tenant (already resolved earlier, trusted);
    /// 3. domain-to-tenant mapping (existence-checked);
    /// 4. a slug-shaped token scanned out of the raw message
    ///    (existence-checked);
    /// 5. a capitalized-name substring converted to slug form; if the
    ///    direct slug is unknown, an exact lookup of that slug in the
    ///    directory supplies the canonical slug.
    ///
    /// `Ok(None)` means unresolved, which is not an error.
    pub async fn resolve(&self, signals: TenantSignals<'_>) -> Result<Option<String>> {
        if let Some(explicit) = non_blank(signals.explicit_slug) {
            let slug = slugify(explicit);
            if !slug.is_empty() && self.directory.tenant_exists(&slug).await? {
                return Ok(Some(slug));
            }
        }

        if let Some(context) = non_blank(signals.context_tenant) {
            return Ok(Some(context.to_string()));
        }

        if let Some(domain) = non_blank(signals.domain) {
            if let Some(mapped) = self.directory.tenant_slug_for_domain(domain).await? {
                if !mapped.is_empty() && self.directory.tenant_exists(&mapped).await? {
                    return Ok(Some(mapped));
                }
            }
        }

        if let Some(caps) = SLUG_TOKEN.captures(signals.message) {
            let slug = slugify(&caps[1]);
            if !slug.is_empty() && self.directory.tenant_exists(&slug).await? {
                return Ok(Some(slug));
            }
        }

        if let Some(name) = extract_tenant_name(signals.message) {
            let slug = slugify(&name);
            if !slug.is_empty() {
                if self.directory.tenant_exists(&slug).await? {
                    return Ok(Some(slug));
                }
                if let Some(tenant) = self.directory.tenant_by_slug(&slug).await? {
                    return Ok(Some(tenant.slug_name));
                }
            }
        }

        Ok(None)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
