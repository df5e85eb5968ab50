//! Tenant isolation layer.
//!
//! Every tenant owns exactly one vector-store collection and one
//! raw/processed data area, all derived here from the tenant id alone.
//! Derivation is a pure function over a validated id, so two distinct
//! tenants can never resolve to the same collection or directory.

use std::path::{Path, PathBuf};

use crate::core::errors::WeaverError;

/// Filesystem and collection layout for a single tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantNamespace {
    pub tenant_id: String,
    /// Vector-store collection (SQLite table) name, tenant-qualified.
    pub collection: String,
    pub tenant_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl TenantNamespace {
    /// Derive the namespace for `tenant_id` under `users_dir`.
    ///
    /// Rejects ids that could escape the per-tenant directory or produce an
    /// unusable table name. Does not touch the filesystem.
    pub fn resolve(users_dir: &Path, tenant_id: &str) -> Result<Self, WeaverError> {
        validate_tenant_id(tenant_id)?;

        let tenant_dir = users_dir.join(tenant_id);
        Ok(TenantNamespace {
            tenant_id: tenant_id.to_string(),
            collection: format!("weaver_kb_{tenant_id}"),
            raw_dir: tenant_dir.join("raw"),
            processed_dir: tenant_dir.join("processed"),
            tenant_dir,
        })
    }

    /// Path of the tenant's vector-store database file.
    pub fn db_path(&self) -> PathBuf {
        self.tenant_dir.join("vector_db.sqlite")
    }

    /// Create the tenant's directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), WeaverError> {
        for dir in [&self.tenant_dir, &self.raw_dir, &self.processed_dir] {
            std::fs::create_dir_all(dir).map_err(WeaverError::storage)?;
        }
        Ok(())
    }
}

fn validate_tenant_id(tenant_id: &str) -> Result<(), WeaverError> {
    if tenant_id.is_empty() {
        return Err(WeaverError::Validation(
            "tenant id must not be empty".to_string(),
        ));
    }
    if tenant_id.len() > 64 {
        return Err(WeaverError::Validation(
            "tenant id too long (max 64 characters)".to_string(),
        ));
    }
    let valid = tenant_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid || tenant_id.starts_with('.') {
        return Err(WeaverError::Validation(format!(
            "invalid tenant id: {tenant_id:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_is_deterministic() {
        let base = Path::new("/data/users");
        let a = TenantNamespace::resolve(base, "alice").unwrap();
        let b = TenantNamespace::resolve(base, "alice").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.collection, "weaver_kb_alice");
        assert_eq!(a.raw_dir, base.join("alice").join("raw"));
    }

    #[test]
    fn distinct_tenants_get_disjoint_namespaces() {
        let base = Path::new("/data/users");
        let a = TenantNamespace::resolve(base, "alice").unwrap();
        let b = TenantNamespace::resolve(base, "bob").unwrap();
        assert_ne!(a.collection, b.collection);
        assert_ne!(a.db_path(), b.db_path());
        assert_ne!(a.raw_dir, b.raw_dir);
    }

    #[test]
    fn traversal_attempts_are_rejected() {
        let base = Path::new("/data/users");
        for bad in ["", "../alice", "a/b", "a\\b", ".hidden", "a b", "x\0"] {
            assert!(
                TenantNamespace::resolve(base, bad).is_err(),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn ordinary_usernames_are_accepted() {
        let base = Path::new("/data/users");
        for good in ["alice", "bob-2", "team_infra", "j.doe"] {
            assert!(TenantNamespace::resolve(base, good).is_ok());
        }
    }
}
