//! Positional encoding of composite (`State`) field values.
//!
//! A composite field lists its sub-field names in `defaultdata`, one per line.
//! The stored value is the sub-values joined by `|` in that order, with no
//! name tagging: position is the only link between a value and its name.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::field::{FieldDefinition, FieldKind};

pub const COMPOSITE_DELIMITER: char = '|';

/// Fields whose `role` sub-field is split into a hidden vocabulary source and
/// a visible value.
const ROLE_SPLIT_FIELDS: &[&str] = &["lifecycle_contribute", "lifecycle_contribute_1"];

/// Fields whose `date` sub-field is edited with a date selector.
const DATE_FIELDS: &[&str] = &[
    "lifecycle_contribute",
    "lifecycle_contribute_1",
    "metaMetadata_contribute",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFieldWidget {
    Hidden,
    Text,
    Date,
}

/// One positional slot of a composite field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubField {
    /// Key within the composite; appended to the field input name after `_`.
    pub slot: String,
    pub label: String,
    pub widget: SubFieldWidget,
}

/// Sub-field names declared in a composite `defaultdata`, trimmed, blank
/// lines skipped.
pub fn sub_field_names(defaultdata: &str) -> impl Iterator<Item = &str> {
    defaultdata.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Expands a composite definition into its ordered slots. Non-composite kinds
/// have none.
pub fn composite_layout(def: &FieldDefinition) -> Vec<SubField> {
    if def.datatype != FieldKind::State {
        return Vec::new();
    }
    let shortname = def.shortname.as_str();
    let mut layout = Vec::new();
    for sub in sub_field_names(&def.defaultdata) {
        let label = if def.name == "requirement" {
            format!("{}[orComposite][{sub}]", def.name)
        } else {
            format!("{}[{sub}]", def.name)
        };

        if sub == "role" && ROLE_SPLIT_FIELDS.contains(&shortname) {
            layout.push(SubField {
                slot: "role#source".to_string(),
                label: format!("{label}[source]"),
                widget: SubFieldWidget::Hidden,
            });
            layout.push(SubField {
                slot: "role#value".to_string(),
                label: format!("{label}[value]"),
                widget: SubFieldWidget::Text,
            });
        } else if sub == "date" && DATE_FIELDS.contains(&shortname) {
            layout.push(SubField {
                slot: sub.to_string(),
                label,
                widget: SubFieldWidget::Date,
            });
        } else {
            let widget = if sub == "source" {
                SubFieldWidget::Hidden
            } else {
                SubFieldWidget::Text
            };
            layout.push(SubField {
                slot: sub.to_string(),
                label,
                widget,
            });
        }
    }
    layout
}

/// Ordered slot keys of a composite definition.
pub fn composite_slots(def: &FieldDefinition) -> Vec<String> {
    composite_layout(def).into_iter().map(|sub| sub.slot).collect()
}

/// Joins the values in slot order. Slots without a value encode as empty
/// segments.
pub fn encode_composite<S: AsRef<str>>(slots: &[S], values: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (i, slot) in slots.iter().enumerate() {
        if i > 0 {
            out.push(COMPOSITE_DELIMITER);
        }
        if let Some(value) = values.get(slot.as_ref()) {
            out.push_str(value);
        }
    }
    out
}

/// Splits `raw` and zips it against the slots. Missing trailing segments map
/// to the empty string; segments past the last slot are dropped.
pub fn decode_composite<S: AsRef<str>>(raw: &str, slots: &[S]) -> BTreeMap<String, String> {
    let mut segments = raw.split(COMPOSITE_DELIMITER);
    slots
        .iter()
        .map(|slot| {
            let value = segments.next().unwrap_or_default();
            (slot.as_ref().to_string(), value.to_string())
        })
        .collect()
}

/// Rejects a sub-value that would shift every later position on decode.
pub fn check_sub_value(slot: &str, value: &str) -> Result<(), CoreError> {
    if value.contains(COMPOSITE_DELIMITER) {
        return Err(CoreError::DelimiterInValue {
            slot: slot.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ContextLevel, Visibility};
    use crate::ids::{CategoryId, FieldId};

    fn state_field(shortname: &str, name: &str, subs: &str) -> FieldDefinition {
        FieldDefinition {
            id: FieldId::new(1),
            categoryid: CategoryId::new(1),
            shortname: shortname.into(),
            name: name.into(),
            datatype: FieldKind::State,
            defaultdata: subs.into(),
            required: false,
            locked: false,
            forceunique: false,
            signup: false,
            visible: Visibility::All,
            contextlevel: ContextLevel::Course,
            sortorder: 0,
        }
    }

    #[test]
    fn contribute_role_takes_two_positions() {
        let def = state_field("lifecycle_contribute_1", "contribute", "role\nentity\n\ndate\n");
        assert_eq!(
            composite_slots(&def),
            vec!["role#source", "role#value", "entity", "date"]
        );
        let layout = composite_layout(&def);
        assert_eq!(layout[0].widget, SubFieldWidget::Hidden);
        assert_eq!(layout[1].label, "contribute[role][value]");
        assert_eq!(layout[3].widget, SubFieldWidget::Date);
    }

    #[test]
    fn role_elsewhere_is_a_single_slot() {
        let def = state_field("educational_intendedEndUserRole", "intendedEndUserRole", "source\r\nvalue");
        let layout = composite_layout(&def);
        assert_eq!(composite_slots(&def), vec!["source", "value"]);
        assert_eq!(layout[0].widget, SubFieldWidget::Hidden);
        assert_eq!(layout[1].widget, SubFieldWidget::Text);
    }

    #[test]
    fn requirement_label_marks_or_composite() {
        let def = state_field("technical_requirement", "requirement", "type\nname");
        assert_eq!(composite_layout(&def)[0].label, "requirement[orComposite][type]");
    }

    #[test]
    fn encode_fills_gaps_positionally() {
        let slots = ["source", "value", "extra"];
        let mut values = BTreeMap::new();
        values.insert("value".to_string(), "student".to_string());
        assert_eq!(encode_composite(&slots, &values), "|student|");
    }

    #[test]
    fn decode_pads_and_truncates() {
        let slots = ["a", "b", "c"];
        let short = decode_composite("x", &slots);
        assert_eq!(short["a"], "x");
        assert_eq!(short["b"], "");
        assert_eq!(short["c"], "");

        let long = decode_composite("1|2|3|4|5", &slots);
        assert_eq!(long.len(), 3);
        assert_eq!(long["c"], "3");
    }

    #[test]
    fn delimiter_in_sub_value_is_rejected() {
        assert!(check_sub_value("value", "plain").is_ok());
        assert!(matches!(
            check_sub_value("value", "a|b"),
            Err(CoreError::DelimiterInValue { slot }) if slot == "value"
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_inverts_encode(
                names in proptest::collection::btree_set("[a-z]{1,8}", 1..8),
                picks in proptest::collection::vec((any::<bool>(), "[^|]{0,12}"), 8),
            ) {
                let slots: Vec<String> = names.into_iter().collect();
                let mut values = BTreeMap::new();
                for (slot, (present, value)) in slots.iter().zip(picks.iter()) {
                    if *present {
                        values.insert(slot.clone(), value.clone());
                    }
                }

                let decoded = decode_composite(&encode_composite(&slots, &values), &slots);

                let expected: BTreeMap<String, String> = slots
                    .iter()
                    .map(|s| (s.clone(), values.get(s).cloned().unwrap_or_default()))
                    .collect();
                prop_assert_eq!(decoded, expected);
            }
        }
    }
}
