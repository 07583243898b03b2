use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;

use super::{Collection, RecordStore, StoreError, StoreResult};
use crate::models::{
    GlobalUserPermission, NewGlobalUserPermission, NewOrganisationDocumentVersion,
    NewOrganisationUserPermission, NewUser, Organisation, OrganisationDocument,
    OrganisationDocumentVersion, OrganisationUserPermission, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    global_user_permissions: Vec<GlobalUserPermission>,
    organisations: Vec<Organisation>,
    organisation_user_permissions: Vec<OrganisationUserPermission>,
    organisation_documents: Vec<OrganisationDocument>,
    organisation_document_versions: Vec<OrganisationDocumentVersion>,
}

/// In-process store for exercising hooks without Postgres. Unique columns
/// mirror the migration's constraints.
pub struct MemoryRecordStore {
    present: Mutex<HashSet<Collection>>,
    failing: Mutex<HashSet<Collection>>,
    tables: Mutex<Tables>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self {
            present: Mutex::new(Collection::ALL.into_iter().collect()),
            failing: Mutex::new(HashSet::new()),
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `find_collection` report the collection as missing.
    pub fn without_collection(self, collection: Collection) -> Self {
        self.present.lock().unwrap().remove(&collection);
        self
    }

    /// Makes every insert/update into the collection fail with a database error.
    pub fn failing_writes_to(self, collection: Collection) -> Self {
        self.failing.lock().unwrap().insert(collection);
        self
    }

    pub fn users(&self) -> Vec<User> {
        self.tables.lock().unwrap().users.clone()
    }

    pub fn global_user_permissions(&self) -> Vec<GlobalUserPermission> {
        self.tables.lock().unwrap().global_user_permissions.clone()
    }

    pub fn organisations(&self) -> Vec<Organisation> {
        self.tables.lock().unwrap().organisations.clone()
    }

    pub fn organisation_user_permissions(&self) -> Vec<OrganisationUserPermission> {
        self.tables.lock().unwrap().organisation_user_permissions.clone()
    }

    pub fn organisation_documents(&self) -> Vec<OrganisationDocument> {
        self.tables.lock().unwrap().organisation_documents.clone()
    }

    pub fn organisation_document_versions(&self) -> Vec<OrganisationDocumentVersion> {
        self.tables
            .lock()
            .unwrap()
            .organisation_document_versions
            .clone()
    }

    fn check_writable(&self, collection: Collection) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(&collection) {
            return Err(StoreError::Database(diesel::result::Error::BrokenTransactionManager));
        }
        Ok(())
    }
}

fn unique(taken: bool, constraint: &str) -> StoreResult<()> {
    if taken {
        Err(StoreError::UniqueViolation(constraint.to_string()))
    } else {
        Ok(())
    }
}

impl RecordStore for MemoryRecordStore {
    fn find_collection(&self, name: &str) -> StoreResult<Collection> {
        Collection::from_name(name)
            .filter(|collection| self.present.lock().unwrap().contains(collection))
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn count_records(&self, collection: Collection) -> StoreResult<i64> {
        let tables = self.tables.lock().unwrap();
        let count = match collection {
            Collection::Users => tables.users.len(),
            Collection::GlobalUserPermissions => tables.global_user_permissions.len(),
            Collection::Organisations => tables.organisations.len(),
            Collection::OrganisationUserPermissions => tables.organisation_user_permissions.len(),
            Collection::OrganisationDocuments => tables.organisation_documents.len(),
            Collection::OrganisationDocumentVersions => {
                tables.organisation_document_versions.len()
            }
        };
        Ok(count as i64)
    }

    fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        self.check_writable(Collection::Users)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables.users.iter().any(|u| u.email == user.email),
            "users_email_key",
        )?;
        let now = Utc::now().naive_utc();
        let saved = User {
            id: user.id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(saved.clone());
        Ok(saved)
    }

    fn insert_global_user_permission(
        &self,
        permission: &NewGlobalUserPermission,
    ) -> StoreResult<GlobalUserPermission> {
        self.check_writable(Collection::GlobalUserPermissions)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables
                .global_user_permissions
                .iter()
                .any(|p| p.id == permission.id || p.user_id == permission.user_id),
            "global_user_permissions_pkey",
        )?;
        let now = Utc::now().naive_utc();
        let saved = GlobalUserPermission {
            id: permission.id,
            user_id: permission.user_id,
            role: permission.role.clone(),
            status: permission.status.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.global_user_permissions.push(saved.clone());
        Ok(saved)
    }

    fn insert_organisation(&self, organisation: &Organisation) -> StoreResult<Organisation> {
        self.check_writable(Collection::Organisations)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables.organisations.iter().any(|o| o.id == organisation.id),
            "organisations_pkey",
        )?;
        tables.organisations.push(organisation.clone());
        Ok(organisation.clone())
    }

    fn insert_organisation_user_permission(
        &self,
        permission: &NewOrganisationUserPermission,
    ) -> StoreResult<OrganisationUserPermission> {
        self.check_writable(Collection::OrganisationUserPermissions)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables
                .organisation_user_permissions
                .iter()
                .any(|p| p.user_org_key == permission.user_org_key),
            "organisation_user_permissions_user_org_key_key",
        )?;
        let now = Utc::now().naive_utc();
        let saved = OrganisationUserPermission {
            id: permission.id,
            user_id: permission.user_id,
            organisation_id: permission.organisation_id,
            role: permission.role.clone(),
            status: permission.status.clone(),
            user_org_key: permission.user_org_key.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.organisation_user_permissions.push(saved.clone());
        Ok(saved)
    }

    fn insert_organisation_document(
        &self,
        document: &OrganisationDocument,
    ) -> StoreResult<OrganisationDocument> {
        self.check_writable(Collection::OrganisationDocuments)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables.organisation_documents.iter().any(|d| d.id == document.id),
            "organisation_documents_pkey",
        )?;
        tables.organisation_documents.push(document.clone());
        Ok(document.clone())
    }

    fn update_organisation_document(
        &self,
        document: &OrganisationDocument,
        expected_version: i32,
    ) -> StoreResult<OrganisationDocument> {
        self.check_writable(Collection::OrganisationDocuments)?;
        let mut tables = self.tables.lock().unwrap();
        let existing = tables
            .organisation_documents
            .iter_mut()
            .find(|d| d.id == document.id && d.version_number == expected_version)
            .ok_or_else(|| {
                StoreError::Conflict(format!(
                    "document {} at version {expected_version}",
                    document.id
                ))
            })?;
        existing.file = document.file.clone();
        existing.file_name = document.file_name.clone();
        existing.file_size_bytes = document.file_size_bytes;
        existing.version_number = document.version_number;
        existing.updated_at = Utc::now().naive_utc();
        Ok(existing.clone())
    }

    fn insert_organisation_document_version(
        &self,
        version: &NewOrganisationDocumentVersion,
    ) -> StoreResult<OrganisationDocumentVersion> {
        self.check_writable(Collection::OrganisationDocumentVersions)?;
        let mut tables = self.tables.lock().unwrap();
        unique(
            tables
                .organisation_document_versions
                .iter()
                .any(|v| v.doc_id_version_number_key == version.doc_id_version_number_key),
            "organisation_document_versions_doc_id_version_number_key_key",
        )?;
        let saved = OrganisationDocumentVersion {
            id: version.id,
            organisation_id: version.organisation_id,
            organisation_document_id: version.organisation_document_id,
            version_number: version.version_number,
            file: version.file.clone(),
            file_name: version.file_name.clone(),
            file_size_bytes: version.file_size_bytes,
            doc_id_version_number_key: version.doc_id_version_number_key.clone(),
            created_at: Utc::now().naive_utc(),
        };
        tables.organisation_document_versions.push(saved.clone());
        Ok(saved)
    }
}
