use metafield_core::{InstanceId, LomElement};
use metafield_harness::TestSite;
use metafield_storage::Storage;

#[test]
fn every_lom_key_has_a_default() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let req = site.request(None);

    for element in LomElement::ALL {
        let category = element.category().as_str();
        let shortname = element.shortname();
        let first = site.engine.compute_default(category, shortname, site.course, &req)?;
        let second = site.engine.compute_default(category, shortname, site.course, &req)?;
        assert_eq!(first, second, "{shortname} should be deterministic");
        assert!(!first.value.is_empty(), "{shortname} should not be empty for a seeded course");

        // Courses that do not exist still get a default.
        site.engine
            .compute_default(category, shortname, InstanceId::new(77), &req)?;
    }
    Ok(())
}

#[test]
fn keys_outside_the_table_default_to_empty() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let req = site.request(None);

    for (category, shortname) in [
        ("general", "general_coverage"),
        ("annotation", "annotation_entity"),
        ("rights", "general_title"),
        ("", ""),
    ] {
        let derived = site.engine.compute_default(category, shortname, site.course, &req)?;
        assert_eq!(derived.value, "");
        assert_eq!(derived.date, None);
    }
    Ok(())
}

#[test]
fn general_defaults_come_from_the_course() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let req = site.request(None);
    let value = |shortname: &str| -> Result<String, Box<dyn std::error::Error>> {
        Ok(site
            .engine
            .compute_default("general", shortname, site.course, &req)?
            .value)
    };

    assert_eq!(value("general_identifier")?, "MOODLE|OER-Rust for Educators");
    assert_eq!(value("general_title")?, "Rust for Educators");
    assert_eq!(value("general_description")?, "Ownership, borrowing and lifetimes.");
    assert_eq!(value("general_keyword")?, "programming");
    assert_eq!(value("general_structure")?, "LOMv1.0|MoodleCourse");
    assert_eq!(value("general_aggregationLevel")?, "3");
    Ok(())
}

#[test]
fn course_language_falls_back_to_the_request() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;

    let req = site.request(None);
    let derived = site
        .engine
        .compute_default("general", "general_language", site.course, &req)?;
    assert_eq!(derived.value, "en");

    let req = site.request(None).with_language("de");
    let derived = site
        .engine
        .compute_default("general", "general_language", site.course, &req)?;
    assert_eq!(derived.value, "de");

    let english = site.add_course(3, "Second course")?;
    let derived = site
        .engine
        .compute_default("general", "general_language", english, &req)?;
    assert_eq!(derived.value, "en");
    Ok(())
}

#[test]
fn contributions_carry_a_separate_form_date() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let req = site.request(None);

    let author = site
        .engine
        .compute_default("lifecycle", "lifecycle_contribute", site.course, &req)?;
    assert_eq!(
        author.value,
        "LOMv1.0|author|https://lms.example.org/user/profile.php?id=6|1700000000"
    );
    assert_eq!(author.date.as_deref(), Some("|||2023-11-14"));
    assert_eq!(author.form_value(), "|||2023-11-14");

    let publisher = site
        .engine
        .compute_default("lifecycle", "lifecycle_contribute_1", site.course, &req)?;
    assert_eq!(publisher.value, "LOMv1.0|publisher||1700000000");
    assert_eq!(publisher.date.as_deref(), Some("|||2023-11-14"));
    Ok(())
}

#[test]
fn author_without_teachers_has_no_profile() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let course = site.add_course(3, "Unstaffed")?;
    let req = site.request(None);

    let author = site
        .engine
        .compute_default("lifecycle", "lifecycle_contribute", course, &req)?;
    assert_eq!(author.value, "LOMv1.0|author||1700000003");
    Ok(())
}

#[test]
fn technical_defaults_describe_the_host() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let req = site.request(None);

    let location = site
        .engine
        .compute_default("technical", "technical_location", site.course, &req)?;
    assert_eq!(location.value, "https://lms.example.org/course/view.php?id=2");

    let requirement = site
        .engine
        .compute_default("technical", "technical_requirement", site.course, &req)?;
    assert_eq!(
        requirement.value,
        "https://download.moodle.org|LMS Moodle|Moodle 3.5 Build:2018051700|"
    );

    site.engine.storage_mut().set_config("backup_release", "3.6")?;
    let requirement = site
        .engine
        .compute_default("technical", "technical_requirement", site.course, &req)?;
    assert!(requirement.value.contains("Moodle 3.6 Build:2018051700"));

    let format = site
        .engine
        .compute_default("technical", "technical_format", site.course, &req)?;
    assert_eq!(format.value, "text/html");
    assert!(site.engine.storage().get_config("missing")?.is_none());
    Ok(())
}
