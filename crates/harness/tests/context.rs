use metafield_core::{ContextLevel, InstanceId, UserId};
use metafield_engine::{
    AuthContext, Capability, CourseContextHandler, EngineError, NavNode, NodeType, SaveOutcome,
    Submission, WriteAccess,
};
use metafield_engine::settings::load_settings_with;
use metafield_harness::{RecordingMenu, StaticAuthorizer, TestSite, init_tracing};

// ============================================================================
// Instance and access
// ============================================================================

#[test]
fn instance_is_resolved_once() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));

    assert_eq!(handler.contextlevel(), ContextLevel::Course);
    assert_eq!(handler.instanceid(), Some(site.course));
    let first = handler.get_instance()?.ok_or("course missing")?;
    let second = handler.get_instance()?.ok_or("course missing")?;
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.fullname, "Rust for Educators");
    assert_eq!(handler.get_context(), Some(&AuthContext::course(site.course)));
    Ok(())
}

#[test]
fn missing_course_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let site = TestSite::new()?;
    let handler =
        CourseContextHandler::new(site.engine.storage(), &site.settings, Some(InstanceId::new(404)));
    let teacher = site.teachers[0];
    let auth = StaticAuthorizer::new().login(teacher);

    assert!(matches!(handler.get_instance(), Err(EngineError::EntityNotFound(ref id)) if id == "404"));
    assert!(matches!(
        handler.require_access(&site.request(Some(teacher)), &auth),
        Err(EngineError::EntityNotFound(_))
    ));
    Ok(())
}

#[test]
fn login_is_checked_before_the_course_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let anonymous = StaticAuthorizer::new();

    for instanceid in [InstanceId::new(404), site.course] {
        let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(instanceid));
        assert!(matches!(
            handler.require_access(&site.request(None), &anonymous),
            Err(EngineError::NotLoggedIn)
        ));
    }
    Ok(())
}

#[test]
fn handler_without_instance_has_no_context() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;

    for instanceid in [None, Some(InstanceId::new(0))] {
        let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, instanceid);
        assert_eq!(handler.instanceid(), None);
        assert!(handler.get_instance()?.is_none());
        assert_eq!(handler.get_context(), None);
        assert!(matches!(handler.get_redirect(), Err(EngineError::MissingInstance)));
    }
    Ok(())
}

#[test]
fn redirect_points_at_the_course_page() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));

    assert_eq!(
        handler.get_redirect()?.as_str(),
        "https://lms.example.org/course/view.php?id=2"
    );
    assert_eq!(
        handler.settings_url()?.as_str(),
        "https://lms.example.org/local/metadata/index.php?contextlevel=50"
    );
    Ok(())
}

#[test]
fn access_requires_login_and_course_management() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let site = TestSite::new()?;
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));
    let teacher = site.teachers[0];
    let req = site.request(Some(teacher));

    let anonymous = StaticAuthorizer::new();
    assert!(matches!(
        handler.require_access(&site.request(None), &anonymous),
        Err(EngineError::NotLoggedIn)
    ));
    assert!(matches!(
        handler.require_access(&req, &anonymous),
        Err(EngineError::NotLoggedIn)
    ));

    let logged_in = StaticAuthorizer::new().login(teacher);
    let err = handler.require_access(&req, &logged_in).unwrap_err();
    match err {
        EngineError::PermissionDenied { capability, context } => {
            assert_eq!(capability, "moodle/course:create");
            assert_eq!(context, "context_course(2)");
        }
        other => panic!("expected permission error, got {other:?}"),
    }

    // A grant elsewhere does not count.
    let elsewhere = StaticAuthorizer::new().login(teacher).grant(
        teacher,
        Capability::CourseCreate,
        AuthContext::course(InstanceId::new(3)),
    );
    assert!(handler.require_access(&req, &elsewhere).is_err());

    let manager = StaticAuthorizer::new().login(teacher).grant(
        teacher,
        Capability::CourseCreate,
        AuthContext::course(site.course),
    );
    assert!(handler.require_access(&req, &manager)?);
    Ok(())
}

#[test]
fn write_access_gates_saving() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let teacher = site.teachers[1];
    let req = site.request(Some(teacher));
    let fieldid = site.field("general_title");
    let course = site.course;
    let submission = Submission::new().with("local_metadata_field_general_title", "Managed");
    let manager = StaticAuthorizer::new().login(teacher).grant(
        teacher,
        Capability::CourseCreate,
        AuthContext::course(course),
    );
    let visitor = StaticAuthorizer::new().login(UserId::new(42));

    let (denied, granted) = {
        let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(course));
        (
            handler.write_access(&site.request(Some(UserId::new(42))), &visitor),
            handler.write_access(&req, &manager),
        )
    };
    assert_eq!(denied, WriteAccess::Denied);
    assert_eq!(granted, WriteAccess::Granted);

    let state = site.engine.load(fieldid, course)?;
    assert_eq!(site.engine.save(&state, &submission, denied)?, SaveOutcome::NotPermitted);
    assert!(matches!(
        site.engine.save(&state, &submission, granted)?,
        SaveOutcome::Saved(_)
    ));
    Ok(())
}

// ============================================================================
// Navigation and settings
// ============================================================================

fn manager_of(site: &TestSite) -> (UserId, StaticAuthorizer) {
    let teacher = site.teachers[0];
    let auth = StaticAuthorizer::new()
        .login(teacher)
        .grant(teacher, Capability::CourseCreate, AuthContext::course(site.course))
        .grant(teacher, Capability::SiteConfig, AuthContext::system());
    (teacher, auth)
}

#[test]
fn navigation_is_untouched_while_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    assert!(!site.settings.course.metadata_enabled);
    let (teacher, auth) = manager_of(&site);
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));
    let course = handler.get_instance()?.ok_or("course missing")?;

    let mut parent = NavNode::branch("courseadmin", "Course administration");
    let added = handler.extend_navigation_course(
        &mut parent,
        course,
        &AuthContext::course(site.course),
        &site.request(Some(teacher)),
        &auth,
    )?;

    assert!(!added);
    assert!(parent.children.is_empty());
    Ok(())
}

#[test]
fn navigation_entry_links_to_course_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    site.settings.course.metadata_enabled = true;
    let (teacher, auth) = manager_of(&site);
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));
    let course = handler.get_instance()?.ok_or("course missing")?;
    let context = AuthContext::course(site.course);

    let mut parent = NavNode::branch("courseadmin", "Course administration");
    assert!(handler.extend_navigation_course(
        &mut parent,
        course,
        &context,
        &site.request(Some(teacher)),
        &auth,
    )?);

    let node = parent.find("metadata").ok_or("metadata node missing")?;
    assert_eq!(node.label, "Course metadata");
    assert_eq!(node.node_type, NodeType::Leaf);
    assert_eq!(node.icon.as_deref(), Some("i/settings"));
    assert_eq!(
        node.url.as_ref().map(|u| u.as_str()),
        Some("https://lms.example.org/local/metadata/index.php?id=2&action=coursedata&contextlevel=50")
    );

    // Without course management the entry is skipped.
    let mut parent = NavNode::branch("courseadmin", "Course administration");
    let student = StaticAuthorizer::new().login(UserId::new(42));
    assert!(!handler.extend_navigation_course(
        &mut parent,
        course,
        &context,
        &site.request(Some(UserId::new(42))),
        &student,
    )?);
    assert!(parent.find("metadata").is_none());
    Ok(())
}

#[test]
fn settings_entry_needs_the_flag_and_site_config() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let (teacher, auth) = manager_of(&site);
    let req = site.request(Some(teacher));

    {
        let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));
        let mut menu = RecordingMenu::default();
        assert!(!handler.add_settings_to_context_menu(&mut menu, &req, &auth)?);
        assert!(menu.entries.is_empty());
    }

    site.settings.course.metadata_enabled = true;
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));

    let mut menu = RecordingMenu::default();
    let course_only = StaticAuthorizer::new().login(teacher).grant(
        teacher,
        Capability::CourseCreate,
        AuthContext::course(site.course),
    );
    assert!(!handler.add_settings_to_context_menu(&mut menu, &req, &course_only)?);
    assert!(menu.entries.is_empty());

    assert!(handler.add_settings_to_context_menu(&mut menu, &req, &auth)?);
    assert_eq!(menu.entries.len(), 1);
    let (section, entry) = &menu.entries[0];
    assert_eq!(section, "courses");
    assert_eq!(entry.key, "metadatacontext_courses");
    assert_eq!(entry.label, "Course metadata");
    assert_eq!(
        entry.url.as_str(),
        "https://lms.example.org/local/metadata/index.php?contextlevel=50"
    );
    assert_eq!(entry.required_capabilities, vec![Capability::SiteConfig]);
    Ok(())
}

#[test]
fn settings_file_switches_the_feature_on() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("metadata.toml");
    std::fs::write(
        &path,
        "wwwroot = \"https://courses.example.net/lms\"\n\n[course]\nmetadata_enabled = true\n",
    )?;
    site.settings = load_settings_with(&path, |_| None)?;

    let (teacher, auth) = manager_of(&site);
    let handler = CourseContextHandler::new(site.engine.storage(), &site.settings, Some(site.course));
    let course = handler.get_instance()?.ok_or("course missing")?;
    let mut parent = NavNode::branch("courseadmin", "Course administration");
    assert!(handler.extend_navigation_course(
        &mut parent,
        course,
        &AuthContext::course(site.course),
        &site.request(Some(teacher)),
        &auth,
    )?);

    let url = parent
        .find("metadata")
        .and_then(|node| node.url.as_ref())
        .ok_or("metadata url missing")?;
    assert_eq!(
        url.as_str(),
        "https://courses.example.net/lms/local/metadata/index.php?id=2&action=coursedata&contextlevel=50"
    );
    assert_eq!(
        handler.get_redirect()?.as_str(),
        "https://courses.example.net/lms/course/view.php?id=2"
    );
    Ok(())
}
