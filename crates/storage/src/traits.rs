use metafield_core::{
    CategoryId, ContextLevel, Contributor, DataFormat, FieldCategory, FieldDefinition, FieldId,
    InstanceId, StoredValue, ValueId,
};

use crate::error::StorageError;

/// Course row as the host application stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRecord {
    pub id: InstanceId,
    pub fullname: String,
    pub shortname: String,
    pub lang: String,
    pub summary: String,
    pub format: String,
    pub timecreated: i64,
}

pub trait Storage {
    // ========================================================================
    // Field definitions
    // ========================================================================

    fn get_category(&self, id: CategoryId) -> Result<Option<FieldCategory>, StorageError>;

    fn get_category_by_name(&self, name: &str) -> Result<Option<FieldCategory>, StorageError>;

    fn insert_category(&mut self, name: &str, sortorder: i64) -> Result<CategoryId, StorageError>;

    fn get_field_definition(&self, id: FieldId) -> Result<Option<FieldDefinition>, StorageError>;

    fn get_field_by_shortname(
        &self,
        categoryid: CategoryId,
        shortname: &str,
    ) -> Result<Option<FieldDefinition>, StorageError>;

    /// Definitions for one context level, in category then field sort order.
    fn get_fields_for_context(
        &self,
        contextlevel: ContextLevel,
    ) -> Result<Vec<FieldDefinition>, StorageError>;

    /// Inserts a definition; `def.id` is ignored and the new id returned.
    fn insert_field_definition(&mut self, def: &FieldDefinition) -> Result<FieldId, StorageError>;

    // ========================================================================
    // Stored values
    // ========================================================================

    fn get_value(
        &self,
        instanceid: InstanceId,
        fieldid: FieldId,
    ) -> Result<Option<StoredValue>, StorageError>;

    fn get_values_for_instance(
        &self,
        instanceid: InstanceId,
    ) -> Result<Vec<StoredValue>, StorageError>;

    /// Every row of `fieldid` whose data equals `data` under the column's
    /// collation.
    fn get_values_with_data(
        &self,
        fieldid: FieldId,
        data: &str,
    ) -> Result<Vec<StoredValue>, StorageError>;

    /// Single-statement insert-or-update keyed by `(instanceid, fieldid)`.
    fn upsert_value(
        &mut self,
        instanceid: InstanceId,
        fieldid: FieldId,
        data: &str,
        dataformat: DataFormat,
    ) -> Result<ValueId, StorageError>;

    /// Inserts only when no row exists for the pair. Returns the new row id,
    /// or `None` when a row was already there.
    fn insert_value_if_absent(
        &mut self,
        instanceid: InstanceId,
        fieldid: FieldId,
        data: &str,
        dataformat: DataFormat,
    ) -> Result<Option<ValueId>, StorageError>;

    // ========================================================================
    // Host records (read-only)
    // ========================================================================

    fn get_course(&self, id: InstanceId) -> Result<Option<CourseRecord>, StorageError>;

    /// Users holding `role` in the course, in assignment order.
    fn get_role_users(
        &self,
        role: &str,
        course: InstanceId,
    ) -> Result<Vec<Contributor>, StorageError>;

    /// Name of the first tag attached to the instance.
    fn get_instance_tag(&self, instanceid: InstanceId) -> Result<Option<String>, StorageError>;

    fn get_config(&self, name: &str) -> Result<Option<String>, StorageError>;
}
