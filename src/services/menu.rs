//! Navigation menu read from `menu-config.json`, filtered per caller.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::AuthenticatedUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Grid procedure opened by this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_name: Option<String>,
    /// Absent or empty means visible to everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuConfig {
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

impl MenuItem {
    fn visible_to(&self, roles: &[String]) -> bool {
        match &self.roles {
            None => true,
            Some(required) if required.is_empty() => true,
            Some(required) => required
                .iter()
                .any(|needed| roles.iter().any(|held| held.eq_ignore_ascii_case(needed))),
        }
    }
}

/// Drops items whose `roles` do not intersect `roles`, at every level.
pub fn filter_menu(items: &[MenuItem], roles: &[String]) -> Vec<MenuItem> {
    items
        .iter()
        .filter(|item| item.visible_to(roles))
        .map(|item| MenuItem {
            children: filter_menu(&item.children, roles),
            ..item.clone()
        })
        .collect()
}

#[derive(Clone, Default)]
pub struct MenuService {
    items: Arc<Vec<MenuItem>>,
}

impl MenuService {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// A missing or malformed file yields an empty menu.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<MenuConfig>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => {
                info!("Loaded {} menu entries from {}", config.items.len(), path.display());
                Self::new(config.items)
            }
            Err(e) => {
                warn!("Menu config {} unavailable: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn menu_for(&self, user: Option<&AuthenticatedUser>) -> Vec<MenuItem> {
        let roles = user.map(|user| user.roles.as_slice()).unwrap_or(&[]);
        filter_menu(&self.items, roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Vec<MenuItem> {
        serde_json::from_value::<MenuConfig>(json!({
            "items": [
                {"label": "Home", "route": "/"},
                {"label": "Network", "roles": ["Operator", "Admin"], "children": [
                    {"label": "Buses", "route": "/grid/sp_Grid_Bus", "procedureName": "sp_Grid_Bus"},
                    {"label": "Scaffold", "route": "/admin/scaffold", "roles": ["Admin"]}
                ]},
                {"label": "Administration", "roles": ["Admin"]}
            ]
        }))
        .unwrap()
        .items
    }

    #[test]
    fn anonymous_callers_only_see_public_entries() {
        let menu = filter_menu(&config(), &[]);
        let labels: Vec<&str> = menu.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Home"]);
    }

    #[test]
    fn filters_nested_entries_by_role() {
        let menu = filter_menu(&config(), &["operator".to_string()]);
        assert_eq!(menu.len(), 2);
        let network = &menu[1];
        assert_eq!(network.children.len(), 1);
        assert_eq!(network.children[0].procedure_name.as_deref(), Some("sp_Grid_Bus"));
    }

    #[test]
    fn admins_see_everything_granted_to_admin() {
        let menu = filter_menu(&config(), &["Admin".to_string()]);
        assert_eq!(menu.len(), 3);
        assert_eq!(menu[1].children.len(), 2);
    }

    #[test]
    fn missing_file_gives_empty_menu() {
        let service = MenuService::from_file("does/not/exist.json");
        assert!(service.menu_for(None).is_empty());
    }
}
