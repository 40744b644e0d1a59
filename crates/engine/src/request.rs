use std::fmt;

use metafield_core::{ContextLevel, HostInfo, InstanceId, UserId};

use crate::settings::MetadataSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CourseCreate,
    SiteConfig,
    UserUpdate,
    UserViewAllDetails,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseCreate => "moodle/course:create",
            Self::SiteConfig => "moodle/site:config",
            Self::UserUpdate => "moodle/user:update",
            Self::UserViewAllDetails => "moodle/user:viewalldetails",
        }
    }
}

/// Scope a capability is checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthContext {
    pub level: ContextLevel,
    pub instanceid: InstanceId,
}

impl AuthContext {
    pub fn system() -> Self {
        Self {
            level: ContextLevel::System,
            instanceid: InstanceId::new(0),
        }
    }

    pub fn course(instanceid: InstanceId) -> Self {
        Self {
            level: ContextLevel::Course,
            instanceid,
        }
    }

    pub fn user(user: UserId) -> Self {
        Self {
            level: ContextLevel::User,
            instanceid: InstanceId::new(user.as_i64()),
        }
    }
}

impl fmt::Display for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            ContextLevel::System => return write!(f, "context_system"),
            ContextLevel::User => "user",
            ContextLevel::CourseCategory => "coursecat",
            ContextLevel::Course => "course",
            ContextLevel::Module => "module",
            ContextLevel::Block => "block",
        };
        write!(f, "context_{level}({})", self.instanceid)
    }
}

/// The host's permission system.
pub trait Authorizer {
    fn is_logged_in(&self, user: Option<UserId>) -> bool;

    fn has_capability(
        &self,
        user: Option<UserId>,
        capability: Capability,
        context: &AuthContext,
    ) -> bool;
}

/// Per-request state the host hands to every engine and adapter call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<UserId>,
    pub is_guest: bool,
    pub host: HostInfo,
    pub language: String,
}

impl RequestContext {
    pub fn new(user: Option<UserId>, host: HostInfo, settings: &MetadataSettings) -> Self {
        Self {
            user,
            is_guest: false,
            host,
            language: settings.default_language.clone(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        if !language.is_empty() {
            self.language = language;
        }
        self
    }

    pub fn as_guest(mut self) -> Self {
        self.is_guest = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_display_like_host_contexts() {
        assert_eq!(AuthContext::system().to_string(), "context_system");
        assert_eq!(AuthContext::course(InstanceId::new(4)).to_string(), "context_course(4)");
        assert_eq!(AuthContext::user(UserId::new(2)).to_string(), "context_user(2)");
    }

    #[test]
    fn empty_request_language_keeps_site_default() {
        let host = HostInfo {
            server_name: "lms.example.org".into(),
            https: true,
        };
        let req = RequestContext::new(None, host, &MetadataSettings::default()).with_language("");
        assert_eq!(req.language, "en");
        assert_eq!(req.with_language("fr").language, "fr");
    }
}
