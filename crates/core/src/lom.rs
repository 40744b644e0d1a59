//! Default values for Learning Object Metadata fields.
//!
//! Each known `(category, shortname)` pair maps to exactly one [`DefaultRule`].
//! Rules are evaluated against [`CourseFacts`] gathered once per request, so
//! evaluation itself is pure and cannot fail.

use chrono::DateTime;
use scraper::Html;
use url::Url;

use crate::composite::COMPOSITE_DELIMITER;
use crate::ids::{InstanceId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LomCategory {
    General,
    Lifecycle,
    Technical,
    Educational,
    Rights,
    Relation,
}

impl LomCategory {
    pub const ALL: [LomCategory; 6] = [
        Self::General,
        Self::Lifecycle,
        Self::Technical,
        Self::Educational,
        Self::Rights,
        Self::Relation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Lifecycle => "lifecycle",
            Self::Technical => "technical",
            Self::Educational => "educational",
            Self::Rights => "rights",
            Self::Relation => "relation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LomElement {
    GeneralIdentifier,
    GeneralTitle,
    GeneralLanguage,
    GeneralDescription,
    GeneralKeyword,
    GeneralStructure,
    GeneralAggregationLevel,
    LifecycleStatus,
    LifecycleContribute,
    LifecycleContribute1,
    TechnicalFormat,
    TechnicalLocation,
    TechnicalRequirement,
    EducationalInteractivityType,
    EducationalLearningResourceType,
    EducationalInteractivityLevel,
    EducationalIntendedEndUserRole,
    EducationalContext,
    RightsCost,
    RightsCopyrightAndOtherRestrictions,
    RightsDescription,
    RelationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionRole {
    Author,
    Publisher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRule {
    Literal(&'static str),
    CourseIdentifier,
    CourseTitle,
    CourseLanguage,
    CourseSummary,
    CourseKeyword,
    Contribution(ContributionRole),
    CourseLocation,
    PlatformRequirement,
}

impl LomElement {
    pub const ALL: [LomElement; 22] = [
        Self::GeneralIdentifier,
        Self::GeneralTitle,
        Self::GeneralLanguage,
        Self::GeneralDescription,
        Self::GeneralKeyword,
        Self::GeneralStructure,
        Self::GeneralAggregationLevel,
        Self::LifecycleStatus,
        Self::LifecycleContribute,
        Self::LifecycleContribute1,
        Self::TechnicalFormat,
        Self::TechnicalLocation,
        Self::TechnicalRequirement,
        Self::EducationalInteractivityType,
        Self::EducationalLearningResourceType,
        Self::EducationalInteractivityLevel,
        Self::EducationalIntendedEndUserRole,
        Self::EducationalContext,
        Self::RightsCost,
        Self::RightsCopyrightAndOtherRestrictions,
        Self::RightsDescription,
        Self::RelationKind,
    ];

    pub fn category(&self) -> LomCategory {
        match self {
            Self::GeneralIdentifier
            | Self::GeneralTitle
            | Self::GeneralLanguage
            | Self::GeneralDescription
            | Self::GeneralKeyword
            | Self::GeneralStructure
            | Self::GeneralAggregationLevel => LomCategory::General,
            Self::LifecycleStatus | Self::LifecycleContribute | Self::LifecycleContribute1 => {
                LomCategory::Lifecycle
            }
            Self::TechnicalFormat | Self::TechnicalLocation | Self::TechnicalRequirement => {
                LomCategory::Technical
            }
            Self::EducationalInteractivityType
            | Self::EducationalLearningResourceType
            | Self::EducationalInteractivityLevel
            | Self::EducationalIntendedEndUserRole
            | Self::EducationalContext => LomCategory::Educational,
            Self::RightsCost
            | Self::RightsCopyrightAndOtherRestrictions
            | Self::RightsDescription => LomCategory::Rights,
            Self::RelationKind => LomCategory::Relation,
        }
    }

    /// Field shortname, `{category}_{element}`.
    pub fn shortname(&self) -> &'static str {
        match self {
            Self::GeneralIdentifier => "general_identifier",
            Self::GeneralTitle => "general_title",
            Self::GeneralLanguage => "general_language",
            Self::GeneralDescription => "general_description",
            Self::GeneralKeyword => "general_keyword",
            Self::GeneralStructure => "general_structure",
            Self::GeneralAggregationLevel => "general_aggregationLevel",
            Self::LifecycleStatus => "lifecycle_status",
            Self::LifecycleContribute => "lifecycle_contribute",
            Self::LifecycleContribute1 => "lifecycle_contribute_1",
            Self::TechnicalFormat => "technical_format",
            Self::TechnicalLocation => "technical_location",
            Self::TechnicalRequirement => "technical_requirement",
            Self::EducationalInteractivityType => "educational_interactivityType",
            Self::EducationalLearningResourceType => "educational_learningResourceType",
            Self::EducationalInteractivityLevel => "educational_interactivityLevel",
            Self::EducationalIntendedEndUserRole => "educational_intendedEndUserRole",
            Self::EducationalContext => "educational_context",
            Self::RightsCost => "rights_cost",
            Self::RightsCopyrightAndOtherRestrictions => "rights_copyrightAndOtherRestrictions",
            Self::RightsDescription => "rights_description",
            Self::RelationKind => "relation_kind",
        }
    }

    /// Looks up the element for a category name and field shortname. Both
    /// must agree: a shortname filed under another category is not a LOM key.
    pub fn from_key(category: &str, shortname: &str) -> Option<Self> {
        let category = LomCategory::parse(category)?;
        Self::ALL
            .into_iter()
            .find(|e| e.category() == category && e.shortname() == shortname)
    }

    pub fn rule(&self) -> DefaultRule {
        match self {
            Self::GeneralIdentifier => DefaultRule::CourseIdentifier,
            Self::GeneralTitle => DefaultRule::CourseTitle,
            Self::GeneralLanguage => DefaultRule::CourseLanguage,
            Self::GeneralDescription => DefaultRule::CourseSummary,
            Self::GeneralKeyword => DefaultRule::CourseKeyword,
            Self::GeneralStructure => DefaultRule::Literal("LOMv1.0|MoodleCourse"),
            Self::GeneralAggregationLevel => DefaultRule::Literal("3"),
            Self::LifecycleStatus => DefaultRule::Literal("LOMv1.0|"),
            Self::LifecycleContribute => DefaultRule::Contribution(ContributionRole::Author),
            Self::LifecycleContribute1 => DefaultRule::Contribution(ContributionRole::Publisher),
            Self::TechnicalFormat => DefaultRule::Literal("text/html"),
            Self::TechnicalLocation => DefaultRule::CourseLocation,
            Self::TechnicalRequirement => DefaultRule::PlatformRequirement,
            Self::EducationalInteractivityType => DefaultRule::Literal("LOMv1.0|"),
            Self::EducationalLearningResourceType => DefaultRule::Literal("LOMv1.0|"),
            Self::EducationalInteractivityLevel => DefaultRule::Literal("very high"),
            Self::EducationalIntendedEndUserRole => DefaultRule::Literal("LOMv1.0|student"),
            Self::EducationalContext => DefaultRule::Literal("LOMv1.0|higher education"),
            Self::RightsCost => DefaultRule::Literal("LOMv1.0|no"),
            Self::RightsCopyrightAndOtherRestrictions => DefaultRule::Literal("LOMv1.0|yes"),
            Self::RightsDescription => {
                DefaultRule::Literal("http://creativecommons.org/licenses/by/3.0/")
            }
            Self::RelationKind => DefaultRule::Literal("LOMv1.0|"),
        }
    }
}

/// Name and scheme the request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub server_name: String,
    pub https: bool,
}

impl HostInfo {
    pub fn base_url(&self) -> Option<Url> {
        let scheme = if self.https { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}/", self.server_name)).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
}

/// Everything a default rule may read about one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFacts {
    pub instanceid: InstanceId,
    pub fullname: String,
    /// Course language; empty when the course forces none.
    pub lang: String,
    pub summary: String,
    pub keyword: Option<String>,
    pub timecreated: i64,
    pub editing_teachers: Vec<Contributor>,
    pub host: HostInfo,
    pub request_language: String,
    pub platform_release: String,
    pub platform_build: String,
}

/// A default has two independent outputs: `value` is what gets stored,
/// `date` (contribution rules only) is what the edit form shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedDefault {
    pub value: String,
    pub date: Option<String>,
}

impl DerivedDefault {
    fn value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            date: None,
        }
    }

    /// The form default: the date output when there is one.
    pub fn form_value(&self) -> &str {
        self.date.as_deref().unwrap_or(&self.value)
    }
}

impl DefaultRule {
    pub fn evaluate(&self, facts: &CourseFacts) -> DerivedDefault {
        match self {
            Self::Literal(text) => DerivedDefault::value(*text),
            Self::CourseIdentifier => {
                DerivedDefault::value(format!("MOODLE|OER-{}", segment(&facts.fullname)))
            }
            Self::CourseTitle => DerivedDefault::value(facts.fullname.clone()),
            Self::CourseLanguage => {
                if facts.lang.is_empty() {
                    DerivedDefault::value(facts.request_language.clone())
                } else {
                    DerivedDefault::value(facts.lang.clone())
                }
            }
            Self::CourseSummary => DerivedDefault::value(strip_tags(&facts.summary)),
            Self::CourseKeyword => DerivedDefault::value(facts.keyword.clone().unwrap_or_default()),
            Self::Contribution(role) => {
                let value = match role {
                    ContributionRole::Author => {
                        let profile = facts
                            .editing_teachers
                            .last()
                            .and_then(|teacher| profile_url(&facts.host, teacher.id))
                            .unwrap_or_default();
                        format!("LOMv1.0|author|{profile}|{}", facts.timecreated)
                    }
                    ContributionRole::Publisher => {
                        format!("LOMv1.0|publisher||{}", facts.timecreated)
                    }
                };
                DerivedDefault {
                    value,
                    date: Some(format!("|||{}", iso_date(facts.timecreated))),
                }
            }
            Self::CourseLocation => {
                let location = facts
                    .host
                    .base_url()
                    .and_then(|base| base.join("course/view.php").ok())
                    .map(|mut url| {
                        url.query_pairs_mut()
                            .append_pair("id", &facts.instanceid.to_string());
                        url.to_string()
                    })
                    .unwrap_or_default();
                DerivedDefault::value(location)
            }
            Self::PlatformRequirement => DerivedDefault::value(format!(
                "https://download.moodle.org|LMS Moodle|Moodle {} Build:{}|",
                segment(&facts.platform_release),
                segment(&facts.platform_build)
            )),
        }
    }
}

fn profile_url(host: &HostInfo, user: UserId) -> Option<String> {
    let mut url = host.base_url()?.join("user/profile.php").ok()?;
    url.query_pairs_mut().append_pair("id", &user.to_string());
    Some(url.to_string())
}

fn iso_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%F").to_string())
        .unwrap_or_default()
}

/// Text content of an HTML fragment, entities decoded.
fn strip_tags(html: &str) -> String {
    Html::parse_fragment(html).root_element().text().collect()
}

/// Course text placed inside a composite value must not carry the delimiter,
/// or every later position shifts.
fn segment(text: &str) -> String {
    text.replace(COMPOSITE_DELIMITER, " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> CourseFacts {
        CourseFacts {
            instanceid: InstanceId::new(12),
            fullname: "Intro to Rust".into(),
            lang: String::new(),
            summary: "<p>Ownership <b>and</b> borrowing</p>".into(),
            keyword: Some("systems".into()),
            timecreated: 1_700_000_000,
            editing_teachers: vec![
                Contributor {
                    id: UserId::new(3),
                    firstname: "Ada".into(),
                    lastname: "Byron".into(),
                },
                Contributor {
                    id: UserId::new(9),
                    firstname: "Grace".into(),
                    lastname: "Hopper".into(),
                },
            ],
            host: HostInfo {
                server_name: "lms.example.org".into(),
                https: true,
            },
            request_language: "de".into(),
            platform_release: "3.5".into(),
            platform_build: "2018051700".into(),
        }
    }

    #[test]
    fn every_element_is_addressable_by_its_key() {
        for element in LomElement::ALL {
            assert_eq!(
                LomElement::from_key(element.category().as_str(), element.shortname()),
                Some(element)
            );
        }
    }

    #[test]
    fn key_needs_matching_category() {
        assert_eq!(LomElement::from_key("rights", "general_title"), None);
        assert_eq!(LomElement::from_key("annotation", "annotation_entity"), None);
        assert_eq!(LomElement::from_key("general", "general_coverage"), None);
    }

    #[test]
    fn course_rules_read_facts() {
        let f = facts();
        assert_eq!(
            LomElement::GeneralIdentifier.rule().evaluate(&f).value,
            "MOODLE|OER-Intro to Rust"
        );
        assert_eq!(LomElement::GeneralLanguage.rule().evaluate(&f).value, "de");
        assert_eq!(
            LomElement::GeneralDescription.rule().evaluate(&f).value,
            "Ownership and borrowing"
        );
        assert_eq!(LomElement::GeneralKeyword.rule().evaluate(&f).value, "systems");
        assert_eq!(
            LomElement::TechnicalLocation.rule().evaluate(&f).value,
            "https://lms.example.org/course/view.php?id=12"
        );
        assert_eq!(
            LomElement::TechnicalRequirement.rule().evaluate(&f).value,
            "https://download.moodle.org|LMS Moodle|Moodle 3.5 Build:2018051700|"
        );
    }

    #[test]
    fn course_language_wins_over_request() {
        let mut f = facts();
        f.lang = "en".into();
        assert_eq!(LomElement::GeneralLanguage.rule().evaluate(&f).value, "en");
    }

    #[test]
    fn contribution_yields_value_and_date() {
        let f = facts();
        let author = LomElement::LifecycleContribute.rule().evaluate(&f);
        assert_eq!(
            author.value,
            "LOMv1.0|author|https://lms.example.org/user/profile.php?id=9|1700000000"
        );
        assert_eq!(author.date.as_deref(), Some("|||2023-11-14"));
        assert_eq!(author.form_value(), "|||2023-11-14");

        let publisher = LomElement::LifecycleContribute1.rule().evaluate(&f);
        assert_eq!(publisher.value, "LOMv1.0|publisher||1700000000");
        assert_eq!(publisher.date, author.date);
    }

    #[test]
    fn author_without_teachers_has_empty_profile() {
        let mut f = facts();
        f.editing_teachers.clear();
        f.host.https = false;
        assert_eq!(
            LomElement::LifecycleContribute.rule().evaluate(&f).value,
            "LOMv1.0|author||1700000000"
        );
    }

    #[test]
    fn unusable_host_degrades_to_empty_location() {
        let mut f = facts();
        f.host.server_name = String::new();
        assert_eq!(LomElement::TechnicalLocation.rule().evaluate(&f).value, "");
    }

    #[test]
    fn summary_keeps_text_around_a_bare_angle_bracket() {
        assert_eq!(
            strip_tags("<p>Scores 1 < 2 hold &amp; pass</p>"),
            "Scores 1 < 2 hold & pass"
        );
        let mut f = facts();
        f.summary = "<p>Check <code>a < b</code>, then<br>ship.</p>".into();
        assert_eq!(
            LomElement::GeneralDescription.rule().evaluate(&f).value,
            "Check a < b, thenship."
        );
    }

    #[test]
    fn delimiter_in_course_facts_keeps_positions() {
        let mut f = facts();
        f.fullname = "Rust | Advanced".into();
        f.platform_release = "3.5|beta".into();

        let identifier = LomElement::GeneralIdentifier.rule().evaluate(&f).value;
        assert_eq!(identifier, "MOODLE|OER-Rust   Advanced");
        assert_eq!(identifier.split(COMPOSITE_DELIMITER).count(), 2);

        let requirement = LomElement::TechnicalRequirement.rule().evaluate(&f).value;
        assert_eq!(requirement.split(COMPOSITE_DELIMITER).count(), 4);
        assert_eq!(
            LomElement::GeneralTitle.rule().evaluate(&f).value,
            "Rust | Advanced"
        );
    }
}
