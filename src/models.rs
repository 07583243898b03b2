use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

pub const ROLE_ADMIN: &str = "admin";
pub const STATUS_APPROVED: &str = "approved";

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = global_user_permissions)]
#[diesel(belongs_to(User))]
#[serde(rename_all = "camelCase")]
pub struct GlobalUserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = global_user_permissions)]
pub struct NewGlobalUserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
}

/// Organisation records are built in full by the request handler, so the same
/// struct is inserted and read back.
#[derive(Debug, Clone, Queryable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = organisations)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = organisation_user_permissions)]
#[diesel(belongs_to(Organisation))]
#[diesel(belongs_to(User))]
#[serde(rename_all = "camelCase")]
pub struct OrganisationUserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organisation_id: Uuid,
    pub role: String,
    pub status: String,
    pub user_org_key: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = organisation_user_permissions)]
pub struct NewOrganisationUserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organisation_id: Uuid,
    pub role: String,
    pub status: String,
    pub user_org_key: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Insertable, Associations, Serialize)]
#[diesel(table_name = organisation_documents)]
#[diesel(belongs_to(Organisation))]
#[serde(rename_all = "camelCase")]
pub struct OrganisationDocument {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub file: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub version_number: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = organisation_document_versions)]
#[diesel(belongs_to(OrganisationDocument))]
#[serde(rename_all = "camelCase")]
pub struct OrganisationDocumentVersion {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub organisation_document_id: Uuid,
    pub version_number: i32,
    pub file: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub doc_id_version_number_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = organisation_document_versions)]
pub struct NewOrganisationDocumentVersion {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub organisation_document_id: Uuid,
    pub version_number: i32,
    pub file: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub doc_id_version_number_key: String,
}
