//! Drill-down trail and the parent-row to child-filter mapping.
//!
//! The trail is owned by the client and round-tripped on every drill or
//! navigation request, so the server stays stateless. A stateful trail keeps
//! the full history (bounded by the link's max depth); a stateless trail only
//! keeps a sliding window of the last [`STATELESS_WINDOW`] levels.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::grid::columns::{display_value, LinkConfig};
use crate::grid::types::NavigateAction;

pub const STATELESS_WINDOW: usize = 2;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid placeholder regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrillError {
    #[error("Maximum drill-down depth of {0} reached")]
    MaxDepth(usize),
    #[error("Breadcrumb index {0} is out of range")]
    OutOfRange(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrillMode {
    #[default]
    Stateful,
    Stateless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbLevel {
    pub procedure_name: String,
    pub label: String,
    #[serde(default)]
    pub filter_model: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillTrail {
    #[serde(default)]
    pub mode: DrillMode,
    #[serde(default)]
    pub levels: Vec<BreadcrumbLevel>,
}

impl DrillTrail {
    pub fn is_root(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn current(&self) -> Option<&BreadcrumbLevel> {
        self.levels.last()
    }

    /// Follows `link` one level down. The first drill from the root fixes the
    /// trail's mode.
    pub fn drill(&mut self, link: &LinkConfig, level: BreadcrumbLevel) -> Result<(), DrillError> {
        if self.is_root() {
            self.mode = if link.stateless {
                DrillMode::Stateless
            } else {
                DrillMode::Stateful
            };
        }
        let max_depth = link.max_depth.and_then(|d| usize::try_from(d).ok()).filter(|d| *d > 0);
        self.push(level, max_depth)
    }

    pub fn push(&mut self, level: BreadcrumbLevel, max_depth: Option<usize>) -> Result<(), DrillError> {
        match self.mode {
            DrillMode::Stateless => {
                self.levels.push(level);
                let overflow = self.levels.len().saturating_sub(STATELESS_WINDOW);
                self.levels.drain(..overflow);
            }
            DrillMode::Stateful => {
                if let Some(max) = max_depth {
                    if self.levels.len() >= max {
                        return Err(DrillError::MaxDepth(max));
                    }
                }
                self.levels.push(level);
            }
        }
        Ok(())
    }

    /// Keeps levels `0..=index`.
    pub fn truncate(&mut self, index: usize) -> Result<(), DrillError> {
        if index >= self.levels.len() {
            return Err(DrillError::OutOfRange(index));
        }
        self.levels.truncate(index + 1);
        Ok(())
    }

    pub fn back(&mut self) -> Option<BreadcrumbLevel> {
        self.levels.pop()
    }

    pub fn root(&mut self) {
        self.levels.clear();
    }

    pub fn apply(&mut self, action: &NavigateAction) -> Result<(), DrillError> {
        match action {
            NavigateAction::Breadcrumb { index } => self.truncate(*index),
            NavigateAction::Back => {
                self.back();
                Ok(())
            }
            NavigateAction::Root => {
                self.root();
                Ok(())
            }
        }
    }
}

/// Case-insensitive field lookup on a grid row.
pub fn row_value<'a>(row: &'a Value, column: &str) -> Option<&'a Value> {
    let obj = row.as_object()?;
    obj.get(column).or_else(|| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Maps `{parentColumn: targetField}` onto an `equals` filter model using the
/// parent row's values. Missing and null values are skipped.
pub fn build_child_filter(mapping: &Map<String, Value>, row: &Value) -> Value {
    let filters: Map<String, Value> = mapping
        .iter()
        .filter_map(|(parent_column, target)| {
            let target = target.as_str()?;
            let filter = match row_value(row, parent_column)? {
                Value::Null => return None,
                Value::Number(n) => json!({"filterType": "number", "type": "equals", "filter": n}),
                other => json!({"filterType": "text", "type": "equals", "filter": display_value(other)}),
            };
            Some((target.to_string(), filter))
        })
        .collect();
    Value::Object(filters)
}

/// Substitutes `{Column}` placeholders from `row`; unknown columns render empty.
pub fn render_breadcrumb(template: &str, row: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            row_value(row, &caps[1]).map(display_value).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(name: &str) -> BreadcrumbLevel {
        BreadcrumbLevel {
            procedure_name: name.into(),
            label: name.into(),
            filter_model: json!({}),
        }
    }

    fn link(stateless: bool, max_depth: Option<i32>) -> LinkConfig {
        LinkConfig {
            target_procedure: "sp_Grid_Acline".into(),
            filter_mapping: Map::new(),
            breadcrumb_template: None,
            max_depth,
            stateless,
        }
    }

    #[test]
    fn stateful_trail_enforces_max_depth() {
        let mut trail = DrillTrail::default();
        let link = link(false, Some(2));
        trail.drill(&link, level("a")).unwrap();
        trail.drill(&link, level("b")).unwrap();
        assert_eq!(trail.drill(&link, level("c")), Err(DrillError::MaxDepth(2)));
        assert_eq!(trail.levels.len(), 2);
        assert_eq!(trail.mode, DrillMode::Stateful);
    }

    #[test]
    fn stateless_trail_keeps_a_sliding_window() {
        let mut trail = DrillTrail::default();
        let link = link(true, Some(1));
        for name in ["a", "b", "c", "d"] {
            trail.drill(&link, level(name)).unwrap();
        }
        let names: Vec<&str> = trail.levels.iter().map(|l| l.procedure_name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
        assert_eq!(trail.mode, DrillMode::Stateless);
    }

    #[test]
    fn navigation_transitions() {
        let mut trail = DrillTrail::default();
        let link = link(false, None);
        for name in ["a", "b", "c"] {
            trail.drill(&link, level(name)).unwrap();
        }

        trail.apply(&NavigateAction::Breadcrumb { index: 1 }).unwrap();
        assert_eq!(trail.current().unwrap().procedure_name, "b");

        assert_eq!(
            trail.apply(&NavigateAction::Breadcrumb { index: 5 }),
            Err(DrillError::OutOfRange(5))
        );

        trail.apply(&NavigateAction::Back).unwrap();
        assert_eq!(trail.current().unwrap().procedure_name, "a");

        trail.apply(&NavigateAction::Root).unwrap();
        assert!(trail.is_root());
        trail.apply(&NavigateAction::Back).unwrap();
        assert!(trail.is_root());
    }

    #[test]
    fn child_filter_uses_parent_row_values() {
        let mapping = json!({"BusId": "FromBus", "areaname": "Area", "Missing": "X", "Note": "Note"});
        let row = json!({"BusId": 101, "AreaName": "North", "Note": null});
        let filter = build_child_filter(mapping.as_object().unwrap(), &row);
        assert_eq!(
            filter,
            json!({
                "FromBus": {"filterType": "number", "type": "equals", "filter": 101},
                "Area": {"filterType": "text", "type": "equals", "filter": "North"},
            })
        );
    }

    #[test]
    fn breadcrumb_template_renders_row_values() {
        let row = json!({"BusName": "Riverside", "Voltage": 132.0});
        assert_eq!(
            render_breadcrumb("Lines from {BusName} ({Voltage} kV){Unknown}", &row),
            "Lines from Riverside (132.0 kV)"
        );
    }

    #[test]
    fn trail_deserializes_with_defaults() {
        let trail: DrillTrail = serde_json::from_value(json!({})).unwrap();
        assert!(trail.is_root());
        assert_eq!(trail.mode, DrillMode::Stateful);
    }
}
