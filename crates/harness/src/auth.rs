use std::collections::HashSet;

use metafield_core::UserId;
use metafield_engine::{AuthContext, Authorizer, Capability, SettingsEntry, SettingsMenu};

/// Grants exactly what a test configures.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    logged_in: HashSet<UserId>,
    grants: HashSet<(UserId, Capability, AuthContext)>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, user: UserId) -> Self {
        self.logged_in.insert(user);
        self
    }

    pub fn grant(mut self, user: UserId, capability: Capability, context: AuthContext) -> Self {
        self.grants.insert((user, capability, context));
        self
    }
}

impl Authorizer for StaticAuthorizer {
    fn is_logged_in(&self, user: Option<UserId>) -> bool {
        user.is_some_and(|u| self.logged_in.contains(&u))
    }

    fn has_capability(
        &self,
        user: Option<UserId>,
        capability: Capability,
        context: &AuthContext,
    ) -> bool {
        user.is_some_and(|u| self.grants.contains(&(u, capability, *context)))
    }
}

/// Settings menu that keeps what was registered.
#[derive(Debug, Default)]
pub struct RecordingMenu {
    pub entries: Vec<(String, SettingsEntry)>,
}

impl SettingsMenu for RecordingMenu {
    fn add(&mut self, section: &str, entry: SettingsEntry) {
        self.entries.push((section.to_string(), entry));
    }
}
