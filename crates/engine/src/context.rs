//! Course context handler: adapts the metadata fields to course instances.

use std::cell::OnceCell;

use tracing::{debug, warn};
use url::Url;

use metafield_core::{ContextLevel, InstanceId};
use metafield_storage::{CourseRecord, Storage};

use crate::error::EngineError;
use crate::request::{AuthContext, Authorizer, Capability, RequestContext};
use crate::settings::MetadataSettings;
use crate::WriteAccess;

pub const METADATA_TITLE: &str = "Course metadata";

const METADATA_INDEX: &str = "local/metadata/index.php";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Branch,
    Leaf,
}

/// A node of the host's navigation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavNode {
    pub key: String,
    pub label: String,
    pub url: Option<Url>,
    pub node_type: NodeType,
    pub icon: Option<String>,
    pub children: Vec<NavNode>,
}

impl NavNode {
    pub fn branch(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            url: None,
            node_type: NodeType::Branch,
            icon: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(key: &str, label: &str, url: Url, icon: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            url: Some(url),
            node_type: NodeType::Leaf,
            icon: Some(icon.to_string()),
            children: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NavNode) {
        self.children.push(node);
    }

    pub fn find(&self, key: &str) -> Option<&NavNode> {
        self.children.iter().find(|child| child.key == key)
    }
}

/// An admin page registered in a settings section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsEntry {
    pub key: String,
    pub label: String,
    pub url: Url,
    pub required_capabilities: Vec<Capability>,
}

/// The host's admin settings menu.
pub trait SettingsMenu {
    fn add(&mut self, section: &str, entry: SettingsEntry);
}

/// Resolves the course, its permission context and its URLs for one
/// request. Each lookup runs at most once per handler.
pub struct CourseContextHandler<'a> {
    storage: &'a dyn Storage,
    settings: &'a MetadataSettings,
    instanceid: Option<InstanceId>,
    instance: OnceCell<Option<CourseRecord>>,
    context: OnceCell<Option<AuthContext>>,
}

impl<'a> CourseContextHandler<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        settings: &'a MetadataSettings,
        instanceid: Option<InstanceId>,
    ) -> Self {
        Self {
            storage,
            settings,
            instanceid: instanceid.filter(InstanceId::is_set),
            instance: OnceCell::new(),
            context: OnceCell::new(),
        }
    }

    pub fn contextlevel(&self) -> ContextLevel {
        ContextLevel::Course
    }

    pub fn instanceid(&self) -> Option<InstanceId> {
        self.instanceid
    }

    /// The course record; `None` without an instance id. A set id with no
    /// matching course is an error.
    pub fn get_instance(&self) -> Result<Option<&CourseRecord>, EngineError> {
        if let Some(resolved) = self.instance.get() {
            return Ok(resolved.as_ref());
        }
        let resolved = match self.instanceid {
            Some(id) => match self.storage.get_course(id)? {
                Some(course) => Some(course),
                None => return Err(EngineError::EntityNotFound(id.to_string())),
            },
            None => None,
        };
        Ok(self.instance.get_or_init(|| resolved).as_ref())
    }

    pub fn get_context(&self) -> Option<&AuthContext> {
        self.context
            .get_or_init(|| self.instanceid.map(AuthContext::course))
            .as_ref()
    }

    /// The course home page.
    pub fn get_redirect(&self) -> Result<Url, EngineError> {
        let id = self.instanceid.ok_or(EngineError::MissingInstance)?;
        let mut url = self.settings.wwwroot_url()?.join("course/view.php")?;
        url.query_pairs_mut().append_pair("id", &id.to_string());
        Ok(url)
    }

    /// The field administration page for course metadata.
    pub fn settings_url(&self) -> Result<Url, EngineError> {
        let mut url = self.settings.wwwroot_url()?.join(METADATA_INDEX)?;
        url.query_pairs_mut()
            .append_pair("contextlevel", &ContextLevel::Course.as_i64().to_string());
        Ok(url)
    }

    /// Requires a logged-in caller holding course management in the course
    /// context. Errors here end the request. Login is checked before the
    /// course is resolved.
    pub fn require_access(
        &self,
        req: &RequestContext,
        auth: &dyn Authorizer,
    ) -> Result<bool, EngineError> {
        if !auth.is_logged_in(req.user) {
            warn!(instanceid = ?self.instanceid, "metadata access without login");
            return Err(EngineError::NotLoggedIn);
        }
        self.get_instance()?;
        let context = self.get_context().ok_or(EngineError::MissingInstance)?;
        if !auth.has_capability(req.user, Capability::CourseCreate, context) {
            warn!(user = ?req.user, %context, "metadata access denied");
            return Err(EngineError::PermissionDenied {
                capability: Capability::CourseCreate.as_str(),
                context: context.to_string(),
            });
        }
        Ok(true)
    }

    /// Non-fatal form of the management check, for gating saves.
    pub fn write_access(&self, req: &RequestContext, auth: &dyn Authorizer) -> WriteAccess {
        match self.get_context() {
            Some(context)
                if auth.is_logged_in(req.user)
                    && auth.has_capability(req.user, Capability::CourseCreate, context) =>
            {
                WriteAccess::Granted
            }
            _ => WriteAccess::Denied,
        }
    }

    /// Registers the course metadata admin page. No-op when the feature is
    /// off or the caller cannot configure the site.
    pub fn add_settings_to_context_menu(
        &self,
        menu: &mut dyn SettingsMenu,
        req: &RequestContext,
        auth: &dyn Authorizer,
    ) -> Result<bool, EngineError> {
        if !self.settings.course.metadata_enabled
            || !auth.has_capability(req.user, Capability::SiteConfig, &AuthContext::system())
        {
            debug!("course metadata settings entry not registered");
            return Ok(false);
        }
        menu.add(
            "courses",
            SettingsEntry {
                key: "metadatacontext_courses".to_string(),
                label: METADATA_TITLE.to_string(),
                url: self.settings_url()?,
                required_capabilities: vec![Capability::SiteConfig],
            },
        );
        Ok(true)
    }

    /// Adds the metadata page to a course's settings navigation.
    pub fn extend_navigation_course(
        &self,
        parent: &mut NavNode,
        course: &CourseRecord,
        context: &AuthContext,
        req: &RequestContext,
        auth: &dyn Authorizer,
    ) -> Result<bool, EngineError> {
        if !self.settings.course.metadata_enabled
            || !auth.has_capability(req.user, Capability::CourseCreate, context)
        {
            return Ok(false);
        }
        let mut url = self.settings.wwwroot_url()?.join(METADATA_INDEX)?;
        url.query_pairs_mut()
            .append_pair("id", &course.id.to_string())
            .append_pair("action", "coursedata")
            .append_pair("contextlevel", &ContextLevel::Course.as_i64().to_string());
        parent.add_node(NavNode::leaf("metadata", METADATA_TITLE, url, "i/settings"));
        Ok(true)
    }
}
