//! Permission node model.
//!
//! Permissions form a forest: menu entries and action buttons carried in one
//! table, linked by `parent_id`. Storage persists the flat rows only; the
//! `children` lists are rebuilt by [`crate::tree::build_tree`] on every load
//! and are never trusted from storage.

use serde::{Deserialize, Serialize};

use saaskit_core::PermissionId;

/// Node kinds used by the admin frontend (opaque at this layer).
pub mod kind {
    pub const DIRECTORY: i32 = 0;
    pub const MENU: i32 = 1;
    pub const BUTTON: i32 = 2;
}

/// One permission node, either a flat row or a tree node with `children`
/// attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    pub id: PermissionId,
    pub parent_id: Option<PermissionId>,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub icon: String,
    pub permission_code: String,
    #[serde(default)]
    pub sort: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub kind: i32,
    /// Additional URLs covered by this node, comma-separated.
    #[serde(default)]
    pub alternate_urls: String,
    /// Rebuilt from `parent_id` links at tree-construction time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PermissionNode>,
}

fn default_visible() -> bool {
    true
}

impl PermissionNode {
    /// A root is a node with no parent link (absent or nil).
    pub fn is_root(&self) -> bool {
        match self.parent_id {
            None => true,
            Some(p) => p.is_nil(),
        }
    }

    /// The non-empty, trimmed entries of `alternate_urls`.
    pub fn alternate_urls(&self) -> impl Iterator<Item = &str> {
        self.alternate_urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn node(alternate_urls: &str) -> PermissionNode {
        PermissionNode {
            id: PermissionId::from_uuid(Uuid::from_u128(1)),
            parent_id: None,
            name: "n".into(),
            path: "/x".into(),
            icon: String::new(),
            permission_code: String::new(),
            sort: 0,
            visible: true,
            kind: kind::MENU,
            alternate_urls: alternate_urls.into(),
            children: vec![],
        }
    }

    #[test]
    fn alternate_urls_are_trimmed_and_empty_entries_skipped() {
        let n = node(" /a , ,/b,");
        let urls: Vec<&str> = n.alternate_urls().collect();
        assert_eq!(urls, vec!["/a", "/b"]);
    }

    #[test]
    fn empty_alternate_urls_yields_nothing() {
        let n = node("");
        assert_eq!(n.alternate_urls().count(), 0);
    }

    #[test]
    fn serializes_camel_case_and_omits_empty_children() {
        let mut n = node("");
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("permissionCode").is_some());
        assert!(json.get("children").is_none());

        n.children.push(node(""));
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["children"].as_array().unwrap().len(), 1);

        let back: PermissionNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn nil_parent_counts_as_root() {
        let mut n = node("");
        assert!(n.is_root());
        n.parent_id = Some(PermissionId::nil());
        assert!(n.is_root());
        n.parent_id = Some(PermissionId::from_uuid(Uuid::from_u128(9)));
        assert!(!n.is_root());
    }
}
