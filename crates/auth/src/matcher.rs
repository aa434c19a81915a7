//! Path/method permission matching.
//!
//! Permission paths are administrator-defined prefixes meant to cover whole
//! route families, so matching is deliberately loose: a node matches when
//! its `path` (or any alternate URL) appears as a substring of the request
//! path. Write methods additionally require an action code (`:create`,
//! `:update`, `:delete`) among the matched node's direct children.

use crate::permission::PermissionNode;

/// HTTP method, as far as authorization cares about it.
///
/// Anything outside the four CRUD verbs collapses to `Other`, which carries
/// no action suffix and never authorizes at a matched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl Method {
    /// Case-insensitive parse; unknown verbs collapse to `Other`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if s.eq_ignore_ascii_case("POST") {
            Self::Post
        } else if s.eq_ignore_ascii_case("PUT") {
            Self::Put
        } else if s.eq_ignore_ascii_case("DELETE") {
            Self::Delete
        } else {
            Self::Other
        }
    }
}

/// Decide whether `method path` is covered by the permission forest.
///
/// Superusers never reach this function; callers short-circuit them to
/// "allowed". An empty forest denies everything. This function never errors:
/// malformed nodes simply fail to match.
pub fn authorize(method: Method, path: &str, forest: &[PermissionNode]) -> bool {
    forest.iter().any(|node| node_authorizes(method, path, node))
}

fn node_authorizes(method: Method, path: &str, node: &PermissionNode) -> bool {
    if node_matches(path, node) {
        if method == Method::Get {
            return true;
        }
        if let Some(suffix) = required_suffix(method, path) {
            // Direct children only; grandchildren belong to other menus.
            if node
                .children
                .iter()
                .any(|c| c.permission_code.ends_with(suffix))
            {
                return true;
            }
        }
    }

    // Keep walking regardless of whether this node matched: a deeper node
    // may cover the path on its own.
    node.children
        .iter()
        .any(|child| node_authorizes(method, path, child))
}

fn node_matches(path: &str, node: &PermissionNode) -> bool {
    if !node.path.is_empty() && path.contains(node.path.as_str()) {
        return true;
    }
    node.alternate_urls().any(|url| path.contains(url))
}

fn required_suffix(method: Method, path: &str) -> Option<&'static str> {
    match method {
        // The batch-delete endpoint is a POST for body reasons but is a
        // delete as far as permissions go.
        Method::Post if path.ends_with("/batch-delete") => Some(":delete"),
        Method::Post => Some(":create"),
        Method::Put => Some(":update"),
        Method::Delete => Some(":delete"),
        Method::Get | Method::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saaskit_core::PermissionId;
    use uuid::Uuid;

    fn node(id: u128, path: &str, code: &str) -> PermissionNode {
        PermissionNode {
            id: PermissionId::from_uuid(Uuid::from_u128(id)),
            parent_id: None,
            name: String::new(),
            path: path.into(),
            icon: String::new(),
            permission_code: code.into(),
            sort: 0,
            visible: true,
            kind: 0,
            alternate_urls: String::new(),
            children: vec![],
        }
    }

    fn menu(path: &str, child_codes: &[&str]) -> PermissionNode {
        let mut n = node(1, path, "sys:menu");
        n.children = child_codes
            .iter()
            .enumerate()
            .map(|(i, code)| node(10 + i as u128, "", code))
            .collect();
        n
    }

    #[test]
    fn verbs_parse_case_insensitively() {
        assert_eq!(Method::parse("GET"), Method::Get);
        assert_eq!(Method::parse("post"), Method::Post);
        assert_eq!(Method::parse("Put"), Method::Put);
        assert_eq!(Method::parse("delete"), Method::Delete);
    }

    #[test]
    fn unknown_verbs_collapse_to_other() {
        assert_eq!(Method::parse("PATCH"), Method::Other);
        assert_eq!(Method::parse(""), Method::Other);

        // Other carries no action suffix, so a matched node denies it.
        let forest = vec![menu("/system/roles", &["sys:role:update"])];
        assert!(!authorize(
            Method::parse("PATCH"),
            "/api/system/roles",
            &forest
        ));
    }

    #[test]
    fn get_authorizes_on_bare_path_match() {
        let forest = vec![menu("/system/roles", &[])];
        assert!(authorize(Method::Get, "/api/system/roles", &forest));
    }

    #[test]
    fn get_denies_without_a_match() {
        let forest = vec![menu("/system/roles", &[])];
        assert!(!authorize(Method::Get, "/api/system/users", &forest));
    }

    #[test]
    fn empty_path_never_matches() {
        let forest = vec![menu("", &[])];
        assert!(!authorize(Method::Get, "/anything", &forest));
    }

    #[test]
    fn post_requires_create_code_on_direct_child() {
        let forest = vec![menu("/system/roles", &["sys:role:create"])];
        assert!(authorize(Method::Post, "/api/system/roles", &forest));

        let forest = vec![menu("/system/roles", &["sys:role:update"])];
        assert!(!authorize(Method::Post, "/api/system/roles", &forest));
    }

    #[test]
    fn batch_delete_post_requires_delete_code() {
        let forest = vec![menu("/system/roles", &["sys:role:delete"])];
        assert!(authorize(
            Method::Post,
            "/api/system/roles/batch-delete",
            &forest
        ));

        let forest = vec![menu("/system/roles", &["sys:role:create"])];
        assert!(!authorize(
            Method::Post,
            "/api/system/roles/batch-delete",
            &forest
        ));
    }

    #[test]
    fn put_and_delete_map_to_their_suffixes() {
        let forest = vec![menu("/system/users", &["sys:user:update"])];
        assert!(authorize(Method::Put, "/api/system/users/3", &forest));
        assert!(!authorize(Method::Delete, "/api/system/users/3", &forest));

        let forest = vec![menu("/system/users", &["sys:user:delete"])];
        assert!(authorize(Method::Delete, "/api/system/users/3", &forest));
    }

    #[test]
    fn other_methods_never_authorize_at_a_matched_node() {
        let forest = vec![menu("/system/users", &["sys:user:create"])];
        assert!(!authorize(Method::Other, "/api/system/users", &forest));
    }

    #[test]
    fn grandchild_codes_do_not_count() {
        let mut root = menu("/system/roles", &[]);
        let mut mid = node(2, "", "sys:role");
        mid.children = vec![node(3, "", "sys:role:create")];
        root.children = vec![mid];
        assert!(!authorize(Method::Post, "/api/system/roles", &[root]));
    }

    #[test]
    fn deeper_nodes_are_still_consulted_after_a_failed_match() {
        let mut root = menu("/system", &[]);
        root.children
            .push(menu("/system/roles", &["sys:role:create"]));
        // Root matches but has no :create child; the nested menu does.
        assert!(authorize(Method::Post, "/api/system/roles", &[root]));
    }

    #[test]
    fn alternate_urls_match_too() {
        let mut n = menu("/system/dicts", &[]);
        n.path = "/nowhere".into();
        n.alternate_urls = " /api/v2/dicts , /legacy/dict ".into();
        assert!(authorize(Method::Get, "/api/v2/dicts/42", &[n]));
    }

    #[test]
    fn substring_match_is_deliberately_loose() {
        // "/system/role" covers "/system/roles/abc" and "/system/role-archive";
        // broad prefix coverage is the documented intent.
        let forest = vec![menu("/system/role", &[])];
        assert!(authorize(Method::Get, "/api/system/roles/abc", &forest));
        assert!(authorize(Method::Get, "/api/system/role-archive", &forest));
    }

    #[test]
    fn empty_forest_denies() {
        assert!(!authorize(Method::Get, "/api/system/users", &[]));
    }
}
