use chrono::Utc;
use diesel::{
    prelude::*,
    sql_types::{Bool, Text},
};

use super::{Collection, RecordStore, StoreError, StoreResult};
use crate::db::{DbConnection, PgPool};
use crate::models::{
    GlobalUserPermission, NewGlobalUserPermission, NewOrganisationDocumentVersion,
    NewOrganisationUserPermission, NewUser, Organisation, OrganisationDocument,
    OrganisationDocumentVersion, OrganisationUserPermission, User,
};
use crate::schema::{
    global_user_permissions, organisation_document_versions, organisation_documents,
    organisation_user_permissions, organisations, users,
};

#[derive(QueryableByName)]
struct TablePresence {
    #[diesel(sql_type = Bool)]
    present: bool,
}

/// [`RecordStore`] backed by the Postgres pool; one pooled connection per call.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<DbConnection> {
        self.pool
            .get()
            .map_err(|err| StoreError::Pool(err.to_string()))
    }
}

impl RecordStore for PgRecordStore {
    fn find_collection(&self, name: &str) -> StoreResult<Collection> {
        let collection = Collection::from_name(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        let mut conn = self.conn()?;
        let presence: TablePresence =
            diesel::sql_query("SELECT to_regclass($1) IS NOT NULL AS present")
                .bind::<Text, _>(collection.table_name())
                .get_result(&mut conn)?;

        if presence.present {
            Ok(collection)
        } else {
            Err(StoreError::CollectionNotFound(name.to_string()))
        }
    }

    fn count_records(&self, collection: Collection) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        let count: i64 = match collection {
            Collection::Users => users::table.count().get_result(&mut conn)?,
            Collection::GlobalUserPermissions => {
                global_user_permissions::table.count().get_result(&mut conn)?
            }
            Collection::Organisations => organisations::table.count().get_result(&mut conn)?,
            Collection::OrganisationUserPermissions => organisation_user_permissions::table
                .count()
                .get_result(&mut conn)?,
            Collection::OrganisationDocuments => {
                organisation_documents::table.count().get_result(&mut conn)?
            }
            Collection::OrganisationDocumentVersions => organisation_document_versions::table
                .count()
                .get_result(&mut conn)?,
        };
        Ok(count)
    }

    fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(users::table)
            .values(user)
            .get_result(&mut conn)?;
        Ok(saved)
    }

    fn insert_global_user_permission(
        &self,
        permission: &NewGlobalUserPermission,
    ) -> StoreResult<GlobalUserPermission> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(global_user_permissions::table)
            .values(permission)
            .get_result(&mut conn)?;
        Ok(saved)
    }

    fn insert_organisation(&self, organisation: &Organisation) -> StoreResult<Organisation> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(organisations::table)
            .values(organisation)
            .get_result(&mut conn)?;
        Ok(saved)
    }

    fn insert_organisation_user_permission(
        &self,
        permission: &NewOrganisationUserPermission,
    ) -> StoreResult<OrganisationUserPermission> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(organisation_user_permissions::table)
            .values(permission)
            .get_result(&mut conn)?;
        Ok(saved)
    }

    fn insert_organisation_document(
        &self,
        document: &OrganisationDocument,
    ) -> StoreResult<OrganisationDocument> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(organisation_documents::table)
            .values(document)
            .get_result(&mut conn)?;
        Ok(saved)
    }

    fn update_organisation_document(
        &self,
        document: &OrganisationDocument,
        expected_version: i32,
    ) -> StoreResult<OrganisationDocument> {
        let mut conn = self.conn()?;
        let saved = diesel::update(
            organisation_documents::table
                .find(document.id)
                .filter(organisation_documents::version_number.eq(expected_version)),
        )
        .set((
            organisation_documents::file.eq(&document.file),
            organisation_documents::file_name.eq(&document.file_name),
            organisation_documents::file_size_bytes.eq(document.file_size_bytes),
            organisation_documents::version_number.eq(document.version_number),
            organisation_documents::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)
        .optional()?;

        saved.ok_or_else(|| {
            StoreError::Conflict(format!(
                "document {} at version {expected_version}",
                document.id
            ))
        })
    }

    fn insert_organisation_document_version(
        &self,
        version: &NewOrganisationDocumentVersion,
    ) -> StoreResult<OrganisationDocumentVersion> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(organisation_document_versions::table)
            .values(version)
            .get_result(&mut conn)?;
        Ok(saved)
    }
}
