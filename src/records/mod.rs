//! Record storage used by the lifecycle hooks.
//!
//! Hooks never talk to diesel directly. They go through [`RecordStore`], which
//! exposes the handful of collection operations they need: resolve a
//! collection by name, count its rows, and persist typed records.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    GlobalUserPermission, NewGlobalUserPermission, NewOrganisationDocumentVersion,
    NewOrganisationUserPermission, NewUser, Organisation, OrganisationDocument,
    OrganisationDocumentVersion, OrganisationUserPermission, User,
};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgRecordStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    GlobalUserPermissions,
    Organisations,
    OrganisationUserPermissions,
    OrganisationDocuments,
    OrganisationDocumentVersions,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Users,
        Collection::GlobalUserPermissions,
        Collection::Organisations,
        Collection::OrganisationUserPermissions,
        Collection::OrganisationDocuments,
        Collection::OrganisationDocumentVersions,
    ];

    /// Name clients and hooks use to refer to the collection.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::GlobalUserPermissions => "globalUserPermissions",
            Collection::Organisations => "organisations",
            Collection::OrganisationUserPermissions => "organisationUserPermissions",
            Collection::OrganisationDocuments => "organisationDocuments",
            Collection::OrganisationDocumentVersions => "organisationDocumentVersions",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::GlobalUserPermissions => "global_user_permissions",
            Collection::Organisations => "organisations",
            Collection::OrganisationUserPermissions => "organisation_user_permissions",
            Collection::OrganisationDocuments => "organisation_documents",
            Collection::OrganisationDocumentVersions => "organisation_document_versions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|collection| collection.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection {0} not found")]
    CollectionNotFound(String),
    #[error("record not found")]
    NotFound,
    #[error("{0} was modified by another request")]
    Conflict(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match value {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation(
                    info.constraint_name()
                        .unwrap_or_else(|| info.message())
                        .to_string(),
                )
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Collection-level data access shared by route handlers and hooks.
///
/// Every call is independent: implementations may check out a fresh
/// connection per call and no transaction spans several calls.
pub trait RecordStore: Send + Sync {
    /// Resolves a collection by its public name, failing with
    /// [`StoreError::CollectionNotFound`] when it is unknown or missing from
    /// the backing store.
    fn find_collection(&self, name: &str) -> StoreResult<Collection>;

    fn count_records(&self, collection: Collection) -> StoreResult<i64>;

    fn insert_user(&self, user: &NewUser) -> StoreResult<User>;

    fn insert_global_user_permission(
        &self,
        permission: &NewGlobalUserPermission,
    ) -> StoreResult<GlobalUserPermission>;

    fn insert_organisation(&self, organisation: &Organisation) -> StoreResult<Organisation>;

    fn insert_organisation_user_permission(
        &self,
        permission: &NewOrganisationUserPermission,
    ) -> StoreResult<OrganisationUserPermission>;

    fn insert_organisation_document(
        &self,
        document: &OrganisationDocument,
    ) -> StoreResult<OrganisationDocument>;

    /// Persists the mutable fields of an existing document, but only while
    /// the stored row is still at `expected_version`. A row that has moved on
    /// (or is gone) yields [`StoreError::Conflict`] and nothing is written.
    fn update_organisation_document(
        &self,
        document: &OrganisationDocument,
        expected_version: i32,
    ) -> StoreResult<OrganisationDocument>;

    fn insert_organisation_document_version(
        &self,
        version: &NewOrganisationDocumentVersion,
    ) -> StoreResult<OrganisationDocumentVersion>;
}

/// `<userId>-<organisationId>`, unique per membership.
pub fn user_org_key(user_id: Uuid, organisation_id: Uuid) -> String {
    format!("{user_id}-{organisation_id}")
}

/// `<documentId>-<versionNumber>`, unique per version snapshot.
pub fn doc_id_version_number_key(document_id: Uuid, version_number: i32) -> String {
    format!("{document_id}-{version_number}")
}
