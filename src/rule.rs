//! Rule record encoding shared by every storage path.
//!
//! A casbin rule is a `ptype` plus an ordered list of up to six values. The
//! stored document gives each value a fixed positional column (`v0..v5`);
//! slots beyond the rule's arity stay absent so that store-side queries can
//! distinguish "no value" from "empty string". One fill routine backs both
//! the insert encoding and the delete-match filters, so the positional
//! arithmetic lives in exactly one place.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// Number of positional value slots a stored rule can carry.
pub const MAX_RULE_VALUES: usize = 6;

/// One persisted policy rule document.
///
/// `created_at`/`updated_at` are audit metadata only; they are stamped on
/// insert paths and never participate in match filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasbinRule {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub ptype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v5: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl CasbinRule {
    /// Encodes a rule into its stored shape. Rejects an empty `ptype` and
    /// rules with more than [`MAX_RULE_VALUES`] values.
    pub fn from_rule(ptype: &str, values: &[String]) -> AdapterResult<Self> {
        let [v0, v1, v2, v3, v4, v5] = fill_slots(ptype, values)?;
        Ok(Self {
            id: None,
            ptype: ptype.to_owned(),
            v0,
            v1,
            v2,
            v3,
            v4,
            v5,
            created_at: None,
            updated_at: None,
        })
    }

    /// Stamps the creation timestamp; used on insert paths.
    pub fn stamped(mut self) -> Self {
        self.created_at = Some(DateTime::now());
        self
    }

    /// The rule's values in slot order, with absent and empty slots skipped.
    ///
    /// Only present, non-empty values count when a stored row is turned back
    /// into an engine rule; holes compact.
    pub fn rule_values(&self) -> Vec<String> {
        self.slots()
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub(crate) fn slots(&self) -> [Option<&str>; MAX_RULE_VALUES] {
        [
            self.v0.as_deref(),
            self.v1.as_deref(),
            self.v2.as_deref(),
            self.v3.as_deref(),
            self.v4.as_deref(),
            self.v5.as_deref(),
        ]
    }
}

/// Positional slot fill used by both the insert encoding and the exact-match
/// delete filter.
pub(crate) fn fill_slots(
    ptype: &str,
    values: &[String],
) -> AdapterResult<[Option<String>; MAX_RULE_VALUES]> {
    if ptype.is_empty() {
        return Err(AdapterError::EmptyPolicyType);
    }
    if values.len() > MAX_RULE_VALUES {
        return Err(AdapterError::TooManyRuleValues {
            ptype: ptype.to_owned(),
            count: values.len(),
        });
    }
    let mut slots: [Option<String>; MAX_RULE_VALUES] = Default::default();
    for (slot, value) in slots.iter_mut().zip(values) {
        *slot = Some(value.clone());
    }
    Ok(slots)
}

fn slots_match(want: &[Option<String>; MAX_RULE_VALUES], rule: &CasbinRule) -> bool {
    want.iter()
        .zip(rule.slots())
        .all(|(want, have)| match want {
            Some(want) => have == Some(want.as_str()),
            None => true,
        })
}

/// Partial-record constraint over one rule type: constrained slots must
/// equal their value, unconstrained slots match anything (absent included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub ptype: String,
    pub slots: [Option<String>; MAX_RULE_VALUES],
}

impl RuleFilter {
    /// Exact positional match for a rule: `ptype` plus every slot the rule
    /// occupies. Shares the fill routine with the insert encoding.
    pub fn exact(ptype: &str, rule: &[String]) -> AdapterResult<Self> {
        Ok(Self {
            ptype: ptype.to_owned(),
            slots: fill_slots(ptype, rule)?,
        })
    }

    /// Windowed match for bulk deletion: `field_values` are applied starting
    /// at slot `field_index`; slot `i` is constrained only when
    /// `field_index <= i < field_index + field_values.len()` and `i` is a
    /// valid slot. Values falling outside the slot range are ignored. With no
    /// values, only `ptype` constrains the match.
    pub fn offset(ptype: &str, field_index: usize, field_values: &[String]) -> Self {
        let mut slots: [Option<String>; MAX_RULE_VALUES] = Default::default();
        for (i, slot) in slots.iter_mut().enumerate() {
            if field_index <= i && i < field_index + field_values.len() {
                *slot = Some(field_values[i - field_index].clone());
            }
        }
        Self {
            ptype: ptype.to_owned(),
            slots,
        }
    }

    pub(crate) fn matches(&self, rule: &CasbinRule) -> bool {
        rule.ptype == self.ptype && slots_match(&self.slots, rule)
    }
}

/// Load-time constraint translated from the engine's [`casbin::Filter`].
///
/// The engine hands positional values per rule class ("p" and "g"); empty
/// strings mean unconstrained. A row must satisfy the constraints of its own
/// class; rows of neither class are excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilter {
    pub p: [Option<String>; MAX_RULE_VALUES],
    pub g: [Option<String>; MAX_RULE_VALUES],
}

impl LoadFilter {
    /// Whether any slot is actually constrained. An unconstrained filter is
    /// equivalent to a full load.
    pub fn is_constrained(&self) -> bool {
        self.p.iter().chain(self.g.iter()).any(Option::is_some)
    }

    pub(crate) fn matches(&self, rule: &CasbinRule) -> bool {
        let class = match rule.ptype.chars().next() {
            Some(class) => class,
            None => return false,
        };
        let slots = match class {
            'p' => &self.p,
            'g' => &self.g,
            _ => return false,
        };
        slots_match(slots, rule)
    }

    fn class_slots(values: &[&str]) -> [Option<String>; MAX_RULE_VALUES] {
        let mut slots: [Option<String>; MAX_RULE_VALUES] = Default::default();
        for (slot, value) in slots.iter_mut().zip(values) {
            if !value.is_empty() {
                *slot = Some((*value).to_owned());
            }
        }
        slots
    }
}

impl From<&casbin::Filter<'_>> for LoadFilter {
    fn from(filter: &casbin::Filter<'_>) -> Self {
        Self {
            p: Self::class_slots(&filter.p),
            g: Self::class_slots(&filter.g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn encodes_only_occupied_slots() {
        let encoded = CasbinRule::from_rule("p", &rule(&["alice", "data1", "read"])).unwrap();
        assert_eq!(encoded.ptype, "p");
        assert_eq!(encoded.v0.as_deref(), Some("alice"));
        assert_eq!(encoded.v2.as_deref(), Some("read"));
        assert_eq!(encoded.v3, None);
        assert_eq!(encoded.v5, None);
    }

    #[test]
    fn six_values_fill_every_slot() {
        let encoded =
            CasbinRule::from_rule("p", &rule(&["a", "b", "c", "d", "e", "f"])).unwrap();
        assert_eq!(encoded.v5.as_deref(), Some("f"));
    }

    #[test]
    fn seven_values_are_rejected() {
        let err = CasbinRule::from_rule("p", &rule(&["a", "b", "c", "d", "e", "f", "g"]))
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::TooManyRuleValues { count: 7, .. }
        ));
    }

    #[test]
    fn empty_ptype_is_rejected() {
        assert!(matches!(
            CasbinRule::from_rule("", &rule(&["alice"])),
            Err(AdapterError::EmptyPolicyType)
        ));
    }

    #[test]
    fn zero_values_encode_to_all_absent() {
        let encoded = CasbinRule::from_rule("g", &[]).unwrap();
        assert!(encoded.slots().iter().all(Option::is_none));
        assert!(encoded.rule_values().is_empty());
    }

    #[test]
    fn rule_values_skip_holes_and_empties() {
        let mut encoded = CasbinRule::from_rule("p", &rule(&["alice"])).unwrap();
        encoded.v2 = Some("read".to_string());
        encoded.v1 = Some(String::new());
        assert_eq!(encoded.rule_values(), rule(&["alice", "read"]));
    }

    #[test]
    fn exact_filter_leaves_high_slots_unconstrained() {
        let filter = RuleFilter::exact("p", &rule(&["alice", "data1"])).unwrap();
        let longer = CasbinRule::from_rule("p", &rule(&["alice", "data1", "read"])).unwrap();
        // Unconstrained slots match anything, the way a partial document
        // filter behaves in the store.
        assert!(filter.matches(&longer));
        let other = CasbinRule::from_rule("p", &rule(&["bob", "data1"])).unwrap();
        assert!(!filter.matches(&other));
    }

    #[test]
    fn offset_filter_constrains_only_the_window() {
        let filter = RuleFilter::offset("p", 1, &rule(&["data2"]));
        assert_eq!(filter.slots[0], None);
        assert_eq!(filter.slots[1].as_deref(), Some("data2"));
        assert!(filter.slots[2..].iter().all(Option::is_none));

        let hit = CasbinRule::from_rule("p", &rule(&["alice", "data2", "read"])).unwrap();
        let miss = CasbinRule::from_rule("p", &rule(&["alice", "data1", "read"])).unwrap();
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn offset_filter_from_zero_applies_in_order() {
        let filter = RuleFilter::offset("p", 0, &rule(&["alice", "data1"]));
        assert_eq!(filter.slots[0].as_deref(), Some("alice"));
        assert_eq!(filter.slots[1].as_deref(), Some("data1"));
        assert_eq!(filter.slots[2], None);
    }

    #[test]
    fn offset_filter_clips_values_past_the_last_slot() {
        let values = rule(&["a", "b", "c"]);
        let filter = RuleFilter::offset("p", 4, &values);
        assert_eq!(filter.slots[4].as_deref(), Some("a"));
        assert_eq!(filter.slots[5].as_deref(), Some("b"));
        // "c" would land on v6, which does not exist.
        assert_eq!(filter.slots.iter().flatten().count(), 2);
    }

    #[test]
    fn offset_filter_with_no_values_matches_whole_ptype() {
        let filter = RuleFilter::offset("g", 0, &[]);
        let grouping = CasbinRule::from_rule("g", &rule(&["alice", "admin"])).unwrap();
        let policy = CasbinRule::from_rule("p", &rule(&["alice", "data1", "read"])).unwrap();
        assert!(filter.matches(&grouping));
        assert!(!filter.matches(&policy));
    }

    #[test]
    fn load_filter_treats_empty_strings_as_unconstrained() {
        let engine_filter = casbin::Filter {
            p: vec!["", "data1"],
            g: vec![],
        };
        let filter = LoadFilter::from(&engine_filter);
        assert_eq!(filter.p[0], None);
        assert_eq!(filter.p[1].as_deref(), Some("data1"));
        assert!(filter.is_constrained());

        let hit = CasbinRule::from_rule("p", &rule(&["bob", "data1", "read"])).unwrap();
        let miss = CasbinRule::from_rule("p", &rule(&["bob", "data2", "read"])).unwrap();
        let grouping = CasbinRule::from_rule("g", &rule(&["bob", "admin"])).unwrap();
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
        // The g side carries no constraints, so groupings still load.
        assert!(filter.matches(&grouping));
    }

    #[test]
    fn unconstrained_load_filter_reports_itself() {
        let engine_filter = casbin::Filter {
            p: vec!["", ""],
            g: vec![""],
        };
        assert!(!LoadFilter::from(&engine_filter).is_constrained());
    }
}
