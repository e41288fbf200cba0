//! Column definitions: procedure `columns` merged with `ColumnMetadata`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::entities::column_metadata;
use crate::grid::naming;
use crate::grid::types::DropdownOption;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub field: String,
    pub header_name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub editable: bool,
    pub hidden: bool,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_editor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropdown: Option<DropdownConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropdownSource {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownConfig {
    pub source: DropdownSource,
    /// Inline options for static dropdowns; dynamic ones are fetched on demand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<DropdownOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

impl DropdownConfig {
    pub fn from_metadata(meta: &column_metadata::Model) -> Option<Self> {
        let source = match meta.dropdown_source.as_deref()?.to_ascii_lowercase().as_str() {
            "static" => DropdownSource::Static,
            "dynamic" => DropdownSource::Dynamic,
            _ => return None,
        };
        let options = match source {
            DropdownSource::Static => Some(
                meta.static_options
                    .as_ref()
                    .map(parse_static_options)
                    .unwrap_or_default(),
            ),
            DropdownSource::Dynamic => None,
        };
        Some(Self {
            source,
            options,
            depends_on: meta.depends_on.clone(),
        })
    }
}

/// Accepts `["A", "B"]` or `[{"value": 1, "label": "A"}]`.
pub fn parse_static_options(raw: &Value) -> Vec<DropdownOption> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => {
                let value = obj.get("value")?.clone();
                let label = obj
                    .get("label")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| display_value(&value));
                Some(DropdownOption { value, label })
            }
            Value::Null => None,
            other => Some(DropdownOption {
                value: other.clone(),
                label: display_value(other),
            }),
        })
        .collect()
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    pub target_procedure: String,
    /// Parent column -> target filter field.
    pub filter_mapping: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumb_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<i32>,
    pub stateless: bool,
}

impl LinkConfig {
    pub fn from_metadata(meta: &column_metadata::Model) -> Option<Self> {
        let target = meta.link_target_procedure.as_ref()?;
        Some(Self {
            target_procedure: target.clone(),
            filter_mapping: meta
                .link_filter_mapping
                .as_ref()
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            breadcrumb_template: meta.breadcrumb_template.clone(),
            max_depth: meta.max_drill_depth,
            stateless: meta.stateless_drill,
        })
    }
}

fn base_definition(raw: &Value) -> Option<ColumnDefinition> {
    let field = raw.get("field")?.as_str()?.to_string();
    let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    let flag = |key: &str| raw.get(key).and_then(Value::as_bool).unwrap_or(false);

    Some(ColumnDefinition {
        header_name: text("headerName").unwrap_or_else(|| field.clone()),
        data_type: text("type").unwrap_or_else(|| "text".to_string()),
        editable: flag("editable"),
        hidden: flag("hidden"),
        is_primary_key: flag("isPrimaryKey"),
        cell_editor: None,
        dropdown: None,
        link: None,
        field,
    })
}

/// Metadata overrides header, editor, editability and visibility and adds
/// dropdown/link configuration. `sort_order` is a position: columns without
/// metadata keep their procedure position and yield it to a metadata column
/// asking for the same slot.
pub fn merge_column_definitions(raw: &[Value], metadata: &[column_metadata::Model]) -> Vec<ColumnDefinition> {
    let mut merged: Vec<((i32, bool), ColumnDefinition)> = raw
        .iter()
        .filter_map(base_definition)
        .enumerate()
        .map(|(position, mut column)| {
            let meta = metadata
                .iter()
                .find(|m| m.column_name.eq_ignore_ascii_case(&column.field));
            let Some(meta) = meta else {
                return ((position as i32, true), column);
            };

            if let Some(display_name) = &meta.display_name {
                column.header_name = display_name.clone();
            }
            if let Some(editor) = &meta.cell_editor {
                column.cell_editor = Some(editor.clone());
            }
            if let Some(editable) = meta.is_editable {
                // Keys address the row and stay read-only.
                column.editable =
                    editable && !column.is_primary_key && column.field != naming::ROW_ID_FIELD;
            }
            if let Some(hidden) = meta.is_hidden {
                column.hidden = hidden;
            }
            column.dropdown = DropdownConfig::from_metadata(meta);
            column.link = LinkConfig::from_metadata(meta);

            ((meta.sort_order, false), column)
        })
        .collect();

    merged.sort_by_key(|(order, _)| *order);
    merged.into_iter().map(|(_, column)| column).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    pub(crate) fn metadata(column: &str) -> column_metadata::Model {
        column_metadata::Model {
            id: Uuid::new_v4(),
            procedure_name: "sp_Grid_Bus".into(),
            column_name: column.into(),
            display_name: None,
            cell_editor: None,
            is_editable: None,
            is_hidden: None,
            sort_order: 0,
            dropdown_source: None,
            static_options: None,
            master_table: None,
            value_column: None,
            label_column: None,
            depends_on: None,
            depends_on_column: None,
            link_target_procedure: None,
            link_filter_mapping: None,
            breadcrumb_template: None,
            max_drill_depth: None,
            stateless_drill: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn raw_columns() -> Vec<Value> {
        vec![
            json!({"field": "Id", "headerName": "Id", "type": "text", "editable": false, "isPrimaryKey": true, "hidden": true}),
            json!({"field": "BusId", "headerName": "Bus Id", "type": "number", "editable": false, "isPrimaryKey": true}),
            json!({"field": "BusName", "headerName": "Bus Name", "type": "text", "editable": true}),
            json!({"field": "AreaCode", "headerName": "Area Code", "type": "text", "editable": true}),
            json!({"headerName": "no field"}),
        ]
    }

    #[test]
    fn keeps_procedure_columns_without_metadata() {
        let merged = merge_column_definitions(&raw_columns(), &[]);
        let fields: Vec<&str> = merged.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["Id", "BusId", "BusName", "AreaCode"]);
        assert!(merged[0].hidden);
        assert!(merged[2].editable);
    }

    #[test]
    fn metadata_overrides_presentation() {
        let mut name = metadata("busname");
        name.display_name = Some("Substation".into());
        name.is_editable = Some(false);
        name.sort_order = 1;

        let mut area = metadata("AreaCode");
        area.cell_editor = Some("select".into());
        area.dropdown_source = Some("static".into());
        area.static_options = Some(json!(["North", {"value": "S", "label": "South"}]));
        area.sort_order = 0;

        let mut bus_id = metadata("BusId");
        bus_id.is_editable = Some(true);
        bus_id.sort_order = 1;

        let merged = merge_column_definitions(&raw_columns(), &[name, area, bus_id]);
        let fields: Vec<&str> = merged.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["AreaCode", "Id", "BusId", "BusName"]);

        let bus_name = merged.iter().find(|c| c.field == "BusName").unwrap();
        assert_eq!(bus_name.header_name, "Substation");
        assert!(!bus_name.editable);

        let bus_id = merged.iter().find(|c| c.field == "BusId").unwrap();
        assert!(!bus_id.editable, "primary keys stay read-only");

        let area = merged.iter().find(|c| c.field == "AreaCode").unwrap();
        let dropdown = area.dropdown.as_ref().unwrap();
        assert_eq!(dropdown.source, DropdownSource::Static);
        assert_eq!(
            dropdown.options.as_ref().unwrap(),
            &vec![
                DropdownOption { value: json!("North"), label: "North".into() },
                DropdownOption { value: json!("S"), label: "South".into() },
            ]
        );
    }

    #[test]
    fn metadata_slot_wins_over_unmatched_columns() {
        let mut name = metadata("BusName");
        name.sort_order = 1;

        let merged = merge_column_definitions(&raw_columns(), &[name]);
        let fields: Vec<&str> = merged.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["Id", "BusName", "BusId", "AreaCode"]);
    }

    #[test]
    fn metadata_can_show_or_hide_a_column() {
        let mut id = metadata("Id");
        id.is_hidden = Some(false);
        id.sort_order = 0;
        let mut area = metadata("AreaCode");
        area.is_hidden = Some(true);
        area.sort_order = 3;
        let bus_name = metadata("BusName");

        let merged = merge_column_definitions(&raw_columns(), &[id, area, bus_name]);
        let hidden = |field: &str| merged.iter().find(|c| c.field == field).unwrap().hidden;
        assert!(!hidden("Id"));
        assert!(hidden("AreaCode"));
        assert!(!hidden("BusName"), "no override keeps the procedure flag");
    }

    #[test]
    fn link_configuration_is_attached() {
        let mut bus_name = metadata("BusName");
        bus_name.link_target_procedure = Some("sp_Grid_Acline".into());
        bus_name.link_filter_mapping = Some(json!({"BusId": "FromBus"}));
        bus_name.breadcrumb_template = Some("Lines from {BusName}".into());
        bus_name.max_drill_depth = Some(3);
        bus_name.sort_order = 2;

        let merged = merge_column_definitions(&raw_columns(), &[bus_name]);
        let link = merged[2].link.as_ref().unwrap();
        assert_eq!(link.target_procedure, "sp_Grid_Acline");
        assert_eq!(link.filter_mapping["BusId"], "FromBus");
        assert_eq!(link.max_depth, Some(3));
    }
}
