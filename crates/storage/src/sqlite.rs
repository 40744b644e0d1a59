use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use metafield_core::{
    CategoryId, ContextLevel, Contributor, DataFormat, FieldCategory, FieldDefinition, FieldId,
    FieldKind, InstanceId, StoredValue, UserId, ValueId, Visibility,
};

use crate::error::StorageError;
use crate::traits::{CourseRecord, Storage};

const FIELD_COLUMNS: &str = "id, categoryid, shortname, name, datatype, defaultdata, required, locked, forceunique, signup, visible, contextlevel, sortorder";

const VALUE_COLUMNS: &str = "id, instanceid, fieldid, data, dataformat";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // Host record seeding
    // ========================================================================

    pub fn insert_course(&mut self, course: &CourseRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO course (id, fullname, shortname, lang, summary, format, timecreated) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                course.id.as_i64(),
                course.fullname,
                course.shortname,
                course.lang,
                course.summary,
                course.format,
                course.timecreated,
            ],
        )?;
        Ok(())
    }

    pub fn insert_user(&mut self, user: &Contributor) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO user (id, firstname, lastname) VALUES (?1, ?2, ?3)",
            rusqlite::params![user.id.as_i64(), user.firstname, user.lastname],
        )?;
        Ok(())
    }

    pub fn assign_role(
        &mut self,
        role: &str,
        user: UserId,
        course: InstanceId,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO role_assignment (role, userid, courseid) VALUES (?1, ?2, ?3)",
            rusqlite::params![role, user.as_i64(), course.as_i64()],
        )?;
        Ok(())
    }

    pub fn tag_instance(&mut self, instanceid: InstanceId, tag: &str) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO tag (name) VALUES (?1)",
            rusqlite::params![tag],
        )?;
        tx.execute(
            "INSERT INTO tag_instance (tagid, itemid) SELECT id, ?2 FROM tag WHERE name = ?1",
            rusqlite::params![tag, instanceid.as_i64()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_config(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO config (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            rusqlite::params![name, value],
        )?;
        Ok(())
    }
}

struct RawField {
    id: i64,
    categoryid: i64,
    shortname: String,
    name: String,
    datatype: String,
    defaultdata: String,
    required: bool,
    locked: bool,
    forceunique: bool,
    signup: bool,
    visible: i64,
    contextlevel: i64,
    sortorder: i64,
}

impl RawField {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            categoryid: row.get(1)?,
            shortname: row.get(2)?,
            name: row.get(3)?,
            datatype: row.get(4)?,
            defaultdata: row.get(5)?,
            required: row.get(6)?,
            locked: row.get(7)?,
            forceunique: row.get(8)?,
            signup: row.get(9)?,
            visible: row.get(10)?,
            contextlevel: row.get(11)?,
            sortorder: row.get(12)?,
        })
    }

    fn into_definition(self) -> Result<FieldDefinition, StorageError> {
        Ok(FieldDefinition {
            id: FieldId::new(self.id),
            categoryid: CategoryId::new(self.categoryid),
            shortname: self.shortname,
            name: self.name,
            datatype: FieldKind::parse(&self.datatype)?,
            defaultdata: self.defaultdata,
            required: self.required,
            locked: self.locked,
            forceunique: self.forceunique,
            signup: self.signup,
            visible: Visibility::parse(self.visible)?,
            contextlevel: ContextLevel::parse(self.contextlevel)?,
            sortorder: self.sortorder,
        })
    }
}

struct RawValue {
    id: i64,
    instanceid: i64,
    fieldid: i64,
    data: String,
    dataformat: i64,
}

impl RawValue {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            instanceid: row.get(1)?,
            fieldid: row.get(2)?,
            data: row.get(3)?,
            dataformat: row.get(4)?,
        })
    }

    fn into_value(self) -> Result<StoredValue, StorageError> {
        Ok(StoredValue {
            id: ValueId::new(self.id),
            instanceid: InstanceId::new(self.instanceid),
            fieldid: FieldId::new(self.fieldid),
            data: self.data,
            dataformat: DataFormat::parse(self.dataformat)?,
        })
    }
}

impl Storage for SqliteStorage {
    fn get_category(&self, id: CategoryId) -> Result<Option<FieldCategory>, StorageError> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, sortorder FROM metadata_category WHERE id = ?1",
                rusqlite::params![id.as_i64()],
                |row| {
                    Ok(FieldCategory {
                        id: CategoryId::new(row.get(0)?),
                        name: row.get(1)?,
                        sortorder: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn get_category_by_name(&self, name: &str) -> Result<Option<FieldCategory>, StorageError> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, sortorder FROM metadata_category WHERE name = ?1",
                rusqlite::params![name],
                |row| {
                    Ok(FieldCategory {
                        id: CategoryId::new(row.get(0)?),
                        name: row.get(1)?,
                        sortorder: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn insert_category(&mut self, name: &str, sortorder: i64) -> Result<CategoryId, StorageError> {
        let result = self.conn.execute(
            "INSERT INTO metadata_category (name, sortorder) VALUES (?1, ?2)",
            rusqlite::params![name, sortorder],
        );
        match result {
            Ok(_) => Ok(CategoryId::new(self.conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "category already exists: {name}"
                )))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn get_field_definition(&self, id: FieldId) -> Result<Option<FieldDefinition>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {FIELD_COLUMNS} FROM metadata_field WHERE id = ?1"),
                rusqlite::params![id.as_i64()],
                RawField::from_row,
            )
            .optional()?;
        raw.map(RawField::into_definition).transpose()
    }

    fn get_field_by_shortname(
        &self,
        categoryid: CategoryId,
        shortname: &str,
    ) -> Result<Option<FieldDefinition>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {FIELD_COLUMNS} FROM metadata_field WHERE categoryid = ?1 AND shortname = ?2"
                ),
                rusqlite::params![categoryid.as_i64(), shortname],
                RawField::from_row,
            )
            .optional()?;
        raw.map(RawField::into_definition).transpose()
    }

    fn get_fields_for_context(
        &self,
        contextlevel: ContextLevel,
    ) -> Result<Vec<FieldDefinition>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.categoryid, f.shortname, f.name, f.datatype, f.defaultdata, f.required, f.locked, f.forceunique, f.signup, f.visible, f.contextlevel, f.sortorder
             FROM metadata_field f
             JOIN metadata_category c ON c.id = f.categoryid
             WHERE f.contextlevel = ?1
             ORDER BY c.sortorder, f.sortorder, f.id",
        )?;
        let raws = stmt
            .query_map(rusqlite::params![contextlevel.as_i64()], RawField::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawField::into_definition).collect()
    }

    fn insert_field_definition(&mut self, def: &FieldDefinition) -> Result<FieldId, StorageError> {
        let result = self.conn.execute(
            "INSERT INTO metadata_field (categoryid, shortname, name, datatype, defaultdata, required, locked, forceunique, signup, visible, contextlevel, sortorder)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                def.categoryid.as_i64(),
                def.shortname,
                def.name,
                def.datatype.as_str(),
                def.defaultdata,
                def.required,
                def.locked,
                def.forceunique,
                def.signup,
                def.visible.as_i64(),
                def.contextlevel.as_i64(),
                def.sortorder,
            ],
        );
        match result {
            Ok(_) => Ok(FieldId::new(self.conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "field {} cannot be added to category {}",
                    def.shortname, def.categoryid
                )))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn get_value(
        &self,
        instanceid: InstanceId,
        fieldid: FieldId,
    ) -> Result<Option<StoredValue>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {VALUE_COLUMNS} FROM metadata WHERE instanceid = ?1 AND fieldid = ?2"),
                rusqlite::params![instanceid.as_i64(), fieldid.as_i64()],
                RawValue::from_row,
            )
            .optional()?;
        raw.map(RawValue::into_value).transpose()
    }

    fn get_values_for_instance(
        &self,
        instanceid: InstanceId,
    ) -> Result<Vec<StoredValue>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VALUE_COLUMNS} FROM metadata WHERE instanceid = ?1 ORDER BY fieldid"
        ))?;
        let raws = stmt
            .query_map(rusqlite::params![instanceid.as_i64()], RawValue::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawValue::into_value).collect()
    }

    fn get_values_with_data(
        &self,
        fieldid: FieldId,
        data: &str,
    ) -> Result<Vec<StoredValue>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VALUE_COLUMNS} FROM metadata WHERE fieldid = ?1 AND data = ?2 ORDER BY id"
        ))?;
        let raws = stmt
            .query_map(rusqlite::params![fieldid.as_i64(), data], RawValue::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawValue::into_value).collect()
    }

    fn upsert_value(
        &mut self,
        instanceid: InstanceId,
        fieldid: FieldId,
        data: &str,
        dataformat: DataFormat,
    ) -> Result<ValueId, StorageError> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO metadata (instanceid, fieldid, data, dataformat) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(instanceid, fieldid) DO UPDATE SET data = excluded.data, dataformat = excluded.dataformat
             RETURNING id",
            rusqlite::params![
                instanceid.as_i64(),
                fieldid.as_i64(),
                data,
                dataformat.as_i64(),
            ],
            |row| row.get(0),
        )?;
        debug!(%instanceid, %fieldid, value_id = id, "metadata value upserted");
        Ok(ValueId::new(id))
    }

    fn insert_value_if_absent(
        &mut self,
        instanceid: InstanceId,
        fieldid: FieldId,
        data: &str,
        dataformat: DataFormat,
    ) -> Result<Option<ValueId>, StorageError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "INSERT INTO metadata (instanceid, fieldid, data, dataformat) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(instanceid, fieldid) DO NOTHING
                 RETURNING id",
                rusqlite::params![
                    instanceid.as_i64(),
                    fieldid.as_i64(),
                    data,
                    dataformat.as_i64(),
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(ValueId::new))
    }

    fn get_course(&self, id: InstanceId) -> Result<Option<CourseRecord>, StorageError> {
        let course = self
            .conn
            .query_row(
                "SELECT id, fullname, shortname, lang, summary, format, timecreated FROM course WHERE id = ?1",
                rusqlite::params![id.as_i64()],
                |row| {
                    Ok(CourseRecord {
                        id: InstanceId::new(row.get(0)?),
                        fullname: row.get(1)?,
                        shortname: row.get(2)?,
                        lang: row.get(3)?,
                        summary: row.get(4)?,
                        format: row.get(5)?,
                        timecreated: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }

    fn get_role_users(
        &self,
        role: &str,
        course: InstanceId,
    ) -> Result<Vec<Contributor>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.firstname, u.lastname
             FROM role_assignment ra
             JOIN user u ON u.id = ra.userid
             WHERE ra.role = ?1 AND ra.courseid = ?2
             ORDER BY ra.rowid",
        )?;
        let users = stmt
            .query_map(rusqlite::params![role, course.as_i64()], |row| {
                Ok(Contributor {
                    id: UserId::new(row.get(0)?),
                    firstname: row.get(1)?,
                    lastname: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn get_instance_tag(&self, instanceid: InstanceId) -> Result<Option<String>, StorageError> {
        let name = self
            .conn
            .query_row(
                "SELECT t.name FROM tag_instance ti JOIN tag t ON t.id = ti.tagid
                 WHERE ti.itemid = ?1 ORDER BY ti.id LIMIT 1",
                rusqlite::params![instanceid.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn get_config(&self, name: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE name = ?1",
                rusqlite::params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
