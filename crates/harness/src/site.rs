use std::collections::BTreeMap;

use metafield_core::{
    CategoryId, ContextLevel, Contributor, FieldDefinition, FieldId, FieldKind, HostInfo,
    InstanceId, LomCategory, UserId, Visibility,
};
use metafield_engine::{FieldEngine, MetadataSettings, RequestContext};
use metafield_storage::{CourseRecord, SqliteStorage, Storage, StorageError};

pub const SEED_COURSE_CREATED: i64 = 1_700_000_000;

/// Course-level field outside the LOM table, marked unique.
pub const UNIQUE_FIELD: &str = "general_catalogcode";

/// Locked, required user-level field.
pub const USER_FIELD: &str = "general_orcid";

const SOURCE_VALUE: &str = "source\nvalue";
const CONTRIBUTE: &str = "role\nentity\ndate";

/// `(category, shortname, name, kind, defaultdata)` for every seeded
/// course field.
const LOM_FIELDS: &[(LomCategory, &str, &str, FieldKind, &str)] = &[
    (LomCategory::General, "general_identifier", "identifier", FieldKind::State, "catalog\nentry"),
    (LomCategory::General, "general_title", "title", FieldKind::Text, ""),
    (LomCategory::General, "general_language", "language", FieldKind::Text, ""),
    (LomCategory::General, "general_description", "description", FieldKind::TextArea, ""),
    (LomCategory::General, "general_keyword", "keyword", FieldKind::Text, ""),
    (LomCategory::General, "general_structure", "structure", FieldKind::State, SOURCE_VALUE),
    (LomCategory::General, "general_aggregationLevel", "aggregationLevel", FieldKind::Text, ""),
    (LomCategory::Lifecycle, "lifecycle_status", "status", FieldKind::State, SOURCE_VALUE),
    (LomCategory::Lifecycle, "lifecycle_contribute", "contribute", FieldKind::State, CONTRIBUTE),
    (LomCategory::Lifecycle, "lifecycle_contribute_1", "contribute", FieldKind::State, CONTRIBUTE),
    (LomCategory::Technical, "technical_format", "format", FieldKind::Text, ""),
    (LomCategory::Technical, "technical_location", "location", FieldKind::Text, ""),
    (
        LomCategory::Technical,
        "technical_requirement",
        "requirement",
        FieldKind::State,
        "type\nname\nminimumVersion\nmaximumVersion",
    ),
    (LomCategory::Educational, "educational_interactivityType", "interactivityType", FieldKind::State, SOURCE_VALUE),
    (LomCategory::Educational, "educational_learningResourceType", "learningResourceType", FieldKind::State, SOURCE_VALUE),
    (LomCategory::Educational, "educational_interactivityLevel", "interactivityLevel", FieldKind::Text, ""),
    (LomCategory::Educational, "educational_intendedEndUserRole", "intendedEndUserRole", FieldKind::State, SOURCE_VALUE),
    (LomCategory::Educational, "educational_context", "context", FieldKind::State, SOURCE_VALUE),
    (LomCategory::Rights, "rights_cost", "cost", FieldKind::State, SOURCE_VALUE),
    (
        LomCategory::Rights,
        "rights_copyrightAndOtherRestrictions",
        "copyrightAndOtherRestrictions",
        FieldKind::State,
        SOURCE_VALUE,
    ),
    (LomCategory::Rights, "rights_description", "description", FieldKind::Text, ""),
    (LomCategory::Relation, "relation_kind", "kind", FieldKind::State, SOURCE_VALUE),
];

/// An in-memory site with the LOM categories and fields, one course with two
/// editing teachers, and an engine over it.
pub struct TestSite {
    pub engine: FieldEngine,
    pub settings: MetadataSettings,
    pub course: InstanceId,
    pub teachers: Vec<UserId>,
    fields: BTreeMap<String, FieldId>,
}

impl TestSite {
    pub fn new() -> Result<Self, StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let mut categories: BTreeMap<&str, CategoryId> = BTreeMap::new();
        for (i, category) in LomCategory::ALL.into_iter().enumerate() {
            let id = storage.insert_category(category.as_str(), i as i64 + 1)?;
            categories.insert(category.as_str(), id);
        }
        let general = categories[LomCategory::General.as_str()];

        let mut fields = BTreeMap::new();
        for (i, (category, shortname, name, kind, defaultdata)) in LOM_FIELDS.iter().enumerate() {
            let mut def = definition(categories[category.as_str()], shortname, name, *kind);
            def.defaultdata = defaultdata.to_string();
            def.sortorder = i as i64 + 1;
            fields.insert(shortname.to_string(), storage.insert_field_definition(&def)?);
        }

        let mut unique = definition(general, UNIQUE_FIELD, "catalogcode", FieldKind::Text);
        unique.forceunique = true;
        unique.sortorder = 100;
        fields.insert(UNIQUE_FIELD.to_string(), storage.insert_field_definition(&unique)?);

        let mut orcid = definition(general, USER_FIELD, "orcid", FieldKind::Text);
        orcid.contextlevel = ContextLevel::User;
        orcid.locked = true;
        orcid.required = true;
        orcid.visible = Visibility::Private;
        fields.insert(USER_FIELD.to_string(), storage.insert_field_definition(&orcid)?);

        let course = InstanceId::new(2);
        storage.insert_course(&CourseRecord {
            id: course,
            fullname: "Rust for Educators".to_string(),
            shortname: "RUST101".to_string(),
            lang: String::new(),
            summary: "<p>Ownership, <em>borrowing</em> and lifetimes.</p>".to_string(),
            format: "topics".to_string(),
            timecreated: SEED_COURSE_CREATED,
        })?;
        let mut teachers = Vec::new();
        for (id, first, last) in [(5, "Ada", "Lovelace"), (6, "Alan", "Turing")] {
            let user = UserId::new(id);
            storage.insert_user(&Contributor {
                id: user,
                firstname: first.to_string(),
                lastname: last.to_string(),
            })?;
            storage.assign_role("editingteacher", user, course)?;
            teachers.push(user);
        }
        storage.tag_instance(course, "programming")?;
        storage.set_config("backup_release", "3.5")?;
        storage.set_config("version", "2018051700")?;

        let settings = MetadataSettings {
            wwwroot: "https://lms.example.org".to_string(),
            ..MetadataSettings::default()
        };

        Ok(Self {
            engine: FieldEngine::new(storage),
            settings,
            course,
            teachers,
            fields,
        })
    }

    /// Id of a seeded field. Panics on an unknown shortname.
    pub fn field(&self, shortname: &str) -> FieldId {
        self.fields[shortname]
    }

    pub fn add_course(&mut self, id: i64, fullname: &str) -> Result<InstanceId, StorageError> {
        let course = InstanceId::new(id);
        self.engine.storage_mut().insert_course(&CourseRecord {
            id: course,
            fullname: fullname.to_string(),
            shortname: format!("C{id}"),
            lang: "en".to_string(),
            summary: String::new(),
            format: "topics".to_string(),
            timecreated: SEED_COURSE_CREATED + id,
        })?;
        Ok(course)
    }

    pub fn request(&self, user: Option<UserId>) -> RequestContext {
        let host = HostInfo {
            server_name: "lms.example.org".to_string(),
            https: true,
        };
        RequestContext::new(user, host, &self.settings)
    }

    /// Number of stored rows for the pair.
    pub fn row_count(&self, instanceid: InstanceId, fieldid: FieldId) -> Result<usize, StorageError> {
        let rows = self.engine.storage().get_values_for_instance(instanceid)?;
        Ok(rows.iter().filter(|v| v.fieldid == fieldid).count())
    }
}

fn definition(categoryid: CategoryId, shortname: &str, name: &str, kind: FieldKind) -> FieldDefinition {
    FieldDefinition {
        id: FieldId::new(0),
        categoryid,
        shortname: shortname.to_string(),
        name: name.to_string(),
        datatype: kind,
        defaultdata: String::new(),
        required: false,
        locked: false,
        forceunique: false,
        signup: false,
        visible: Visibility::All,
        contextlevel: ContextLevel::Course,
        sortorder: 0,
    }
}
