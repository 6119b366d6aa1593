//! The client's route table.
//!
//! Routes are declared as a tree, the way the front end groups pages under a
//! shared layout. Children inherit the parent's title and required roles
//! unless they declare their own.

use crate::models::{SessionInfo, ADMIN_ROLE, RESEARCHER_ROLE};

use super::{APP_TITLE, LOGIN_PATH, REGISTER_PATH};

/// Declarative route record.
#[derive(Debug, Clone, Copy)]
pub struct RouteDef {
    pub path: &'static str,
    pub name: &'static str,
    pub title: Option<&'static str>,
    pub roles: &'static [&'static str],
    /// Reachable without a token (login and register).
    pub public: bool,
    /// Left out of menus.
    pub hidden: bool,
    pub children: &'static [RouteDef],
}

impl RouteDef {
    const fn page(path: &'static str, name: &'static str, title: &'static str) -> Self {
        Self {
            path,
            name,
            title: Some(title),
            roles: &[],
            public: false,
            hidden: false,
            children: &[],
        }
    }

    const fn detail(path: &'static str, name: &'static str, title: &'static str) -> Self {
        Self {
            hidden: true,
            ..Self::page(path, name, title)
        }
    }

    const fn group(
        path: &'static str,
        title: Option<&'static str>,
        children: &'static [RouteDef],
    ) -> Self {
        Self {
            path,
            name: "",
            title,
            roles: &[],
            public: false,
            hidden: false,
            children,
        }
    }

    const fn with_roles(self, roles: &'static [&'static str]) -> Self {
        Self { roles, ..self }
    }

    const fn public(self) -> Self {
        Self {
            public: true,
            hidden: true,
            ..self
        }
    }
}

const RESEARCHER_OR_ADMIN: &[&str] = &[RESEARCHER_ROLE, ADMIN_ROLE];
const ADMIN_ONLY: &[&str] = &[ADMIN_ROLE];

const HOME_CHILDREN: &[RouteDef] = &[RouteDef::page("dashboard", "Dashboard", "Dashboard")];

const PROFILE_CHILDREN: &[RouteDef] = &[RouteDef::detail("", "Profile", "Profile")];

const CHANGE_PASSWORD_CHILDREN: &[RouteDef] =
    &[RouteDef::detail("", "ChangePassword", "Change Password")];

const PROJECT_CHILDREN: &[RouteDef] = &[
    RouteDef::page("list", "ProjectList", "Project List"),
    RouteDef::page("apply", "ProjectApply", "Project Application"),
    RouteDef::detail("detail/:id", "ProjectDetail", "Project Detail"),
    RouteDef::detail("edit/:id", "ProjectEdit", "Edit Project"),
    RouteDef::detail("completion/:id", "ProjectCompletion", "Submit Completion Report"),
    RouteDef::detail("completion-audit/:id", "ProjectCompletionAudit", "Completion Audit"),
    RouteDef::page("fund-arrival", "ProjectFundArrival", "Fund Arrivals"),
    RouteDef::detail("fund-arrival/detail/:id", "ProjectFundArrivalDetail", "Fund Arrival Detail"),
];

const EXPENSE_CHILDREN: &[RouteDef] = &[
    RouteDef::page("apply/list", "ExpenseApplyList", "Expense Applications"),
    RouteDef::detail("apply/create", "ExpenseApplyCreate", "New Expense Application"),
    RouteDef::detail("apply/edit/:id", "ExpenseApplyEdit", "Edit Expense Application"),
    RouteDef::detail("apply/detail/:id", "ExpenseApplyDetail", "Expense Application Detail"),
    RouteDef::page("transfer/list", "ExpenseTransferList", "Expense Transfers"),
    RouteDef::detail("transfer/create", "ExpenseTransferCreate", "New Expense Transfer"),
    RouteDef::detail("transfer/edit/:id", "ExpenseTransferEdit", "Edit Expense Transfer"),
    RouteDef::detail("transfer/detail/:id", "ExpenseTransferDetail", "Expense Transfer Detail"),
];

const TASK_CHILDREN: &[RouteDef] = &[RouteDef::page("list", "TaskList", "Task List")];

const ACHIEVEMENT_CHILDREN: &[RouteDef] = &[
    RouteDef::page("list", "AchievementList", "Achievement List"),
    RouteDef::detail("create", "AchievementCreate", "New Achievement"),
    RouteDef::detail("edit/:id", "AchievementEdit", "Edit Achievement"),
    RouteDef::detail("detail/:id", "AchievementDetail", "Achievement Detail"),
    RouteDef::detail("audit/:id", "AchievementAudit", "Achievement Audit"),
];

const SYSTEM_CHILDREN: &[RouteDef] =
    &[RouteDef::page("user", "UserManagement", "User Management").with_roles(ADMIN_ONLY)];

/// The route tree of the research fund client.
pub const DEFAULT_ROUTES: &[RouteDef] = &[
    RouteDef::page(LOGIN_PATH, "Login", "Login").public(),
    RouteDef::page(REGISTER_PATH, "Register", "Register").public(),
    RouteDef::group("/", None, HOME_CHILDREN),
    RouteDef::group("/profile", None, PROFILE_CHILDREN),
    RouteDef::group("/change-password", None, CHANGE_PASSWORD_CHILDREN),
    RouteDef::group("/project", Some("Projects"), PROJECT_CHILDREN),
    RouteDef::group("/expense", Some("Expenses"), EXPENSE_CHILDREN).with_roles(RESEARCHER_OR_ADMIN),
    RouteDef::group("/task", Some("Tasks"), TASK_CHILDREN).with_roles(ADMIN_ONLY),
    RouteDef::group("/achievement", Some("Achievements"), ACHIEVEMENT_CHILDREN),
    RouteDef::group("/system", Some("System"), SYSTEM_CHILDREN).with_roles(ADMIN_ONLY),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// A matchable route with inherited metadata resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub title: Option<String>,
    pub roles: Vec<String>,
    pub public: bool,
    pub hidden: bool,
    segments: Vec<Segment>,
}

impl Route {
    /// Fallback for paths that match nothing. Requires a token like any
    /// other page.
    fn not_found() -> Self {
        Self {
            path: "/:pathMatch(.*)*".to_string(),
            name: "NotFound".to_string(),
            title: None,
            roles: Vec::new(),
            public: false,
            hidden: true,
            segments: Vec::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.name == "NotFound"
    }

    pub fn requires_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Browser-style page title.
    pub fn page_title(&self) -> String {
        match self.title {
            Some(ref title) => format!("{} - {}", title, APP_TITLE),
            None => APP_TITLE.to_string(),
        }
    }

    /// True if `info` holds one of the required roles, or none are required.
    pub fn permits(&self, info: &SessionInfo) -> bool {
        !self.requires_roles() || info.has_any_role(&self.roles)
    }

    fn matches(&self, parts: &[&str]) -> bool {
        self.segments.len() == parts.len()
            && self.segments.iter().zip(parts).all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Param => !part.is_empty(),
            })
    }
}

/// Flattened route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    not_found: Route,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTES)
    }
}

impl RouteTable {
    pub fn new(defs: &[RouteDef]) -> Self {
        let mut routes = Vec::new();
        for def in defs {
            flatten(def, "", None, &[], &mut routes);
        }
        Self {
            routes,
            not_found: Route::not_found(),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve a normalized path. Unknown paths resolve to the not-found route.
    pub fn resolve(&self, path: &str) -> &Route {
        let parts = split(path);
        self.routes
            .iter()
            .find(|route| route.matches(&parts))
            .unwrap_or(&self.not_found)
    }

    /// Menu entries visible to `info`.
    pub fn menu<'a>(&'a self, info: &'a SessionInfo) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes
            .iter()
            .filter(move |route| !route.hidden && route.permits(info))
    }
}

fn flatten(
    def: &RouteDef,
    parent_path: &str,
    parent_title: Option<&str>,
    parent_roles: &[&str],
    out: &mut Vec<Route>,
) {
    let path = join(parent_path, def.path);
    let title = def.title.or(parent_title);
    let roles = if def.roles.is_empty() {
        parent_roles
    } else {
        def.roles
    };

    if def.children.is_empty() {
        out.push(Route {
            segments: split(&path)
                .into_iter()
                .map(|part| {
                    if part.starts_with(':') {
                        Segment::Param
                    } else {
                        Segment::Literal(part.to_string())
                    }
                })
                .collect(),
            path,
            name: def.name.to_string(),
            title: title.map(String::from),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            public: def.public,
            hidden: def.hidden,
        });
    } else {
        for child in def.children {
            flatten(child, &path, title, roles, out);
        }
    }
}

fn join(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return child.to_string();
    }
    let parent = parent.trim_end_matches('/');
    if child.is_empty() {
        if parent.is_empty() {
            "/".to_string()
        } else {
            parent.to_string()
        }
    } else {
        format!("{}/{}", parent, child)
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Strip query and fragment, force a leading slash, drop trailing slashes.
pub fn normalize_path(target: &str) -> String {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let parts = split(&target[..end]);
    format!("/{}", parts.join("/"))
}
