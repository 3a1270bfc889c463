//! The link vocabulary and the policy deciding who may use it.
//!
//! A link request is a body-less function whose name is one of the magic
//! `__xgo_link_*` identifiers in the [`LinkTable`]. The table maps it to the
//! runtime symbol it stands for. Whether a package may declare it is decided
//! by a [`LinkPolicy`]: an ordered list of [`Rule`]s where the first rule
//! that applies wins and a request no rule applies to is rejected.

use std::collections::BTreeMap;

/// Requester the compiler synthesizes to register every instrumented function.
pub const GENERATED_REGISTER_FUNC: &str = "__xgo_link_generated_register_func";
/// Requester the compiler synthesizes to dispatch traps from generated code.
pub const TRAP_FOR_GENERATED: &str = "__xgo_link_trap_for_generated";
/// Requester installing a trap handler.
pub const SET_TRAP: &str = "__xgo_link_set_trap";
/// Requester announcing the start of a test.
pub const ON_TEST_START: &str = "__xgo_link_on_test_start";
/// Reflection method table setter, only usable from `reflect`.
pub const REFLECT_SET_IMPL: &str = "__xgo_set_all_method_by_name_impl";

/// Runtime package the hooks live in.
pub const XGO_RUNTIME_PKG: &str = "github.com/xhd2015/xgo/runtime";
/// Prefix of the test-support packages that may use every link.
pub const XGO_TEST_PKG_PREFIX: &str = "github.com/xhd2015/xgo/test/";

const STANDARD_LINKS: &[(&str, &str)] = &[
    ("__xgo_link_getcurg", "__xgo_getcurg"),
    (SET_TRAP, "__xgo_set_trap"),
    (TRAP_FOR_GENERATED, "__xgo_trap_for_generated"),
    ("__xgo_link_init_finished", "__xgo_init_finished"),
    ("__xgo_link_on_init_finished", "__xgo_on_init_finished"),
    ("__xgo_link_on_gonewproc", "__xgo_on_gonewproc"),
    ("__xgo_link_on_goexit", "__xgo_on_goexit"),
    (ON_TEST_START, "__xgo_on_test_start"),
    ("__xgo_link_get_test_starts", "__xgo_get_test_starts"),
    ("__xgo_link_retrieve_all_funcs_and_clear", "__xgo_retrieve_all_funcs_and_clear"),
    ("__xgo_link_peek_panic", "__xgo_peek_panic"),
    ("__xgo_link_mem_equal", "__xgo_mem_equal"),
    ("__xgo_link_get_pc_name", "__xgo_get_pc_name"),
    (GENERATED_REGISTER_FUNC, "__xgo_register_func"),
];

/// Maps link requesters to the runtime symbols they resolve to.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: BTreeMap<String, String>,
}

impl LinkTable {
    /// The closed vocabulary the patched runtime implements.
    pub fn standard() -> Self {
        STANDARD_LINKS.iter().copied().collect()
    }

    /// Adds or replaces one mapping.
    pub fn insert(&mut self, requester: impl Into<String>, target: impl Into<String>) {
        self.links.insert(requester.into(), target.into());
    }

    /// The target for `requester`, or `None` if it is not a link request.
    pub fn target(&self, requester: &str) -> Option<&str> {
        self.links.get(requester).map(String::as_str)
    }

    /// All requester names.
    pub fn requesters(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    /// All runtime targets.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.links.values().map(String::as_str)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the table has no mappings.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for LinkTable {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut table = Self::default();
        for (requester, target) in iter {
            table.insert(requester, target);
        }
        table
    }
}

/// One link request as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRequest<'a> {
    /// The declared magic identifier.
    pub requester: &'a str,
    /// The runtime symbol it maps to.
    pub target: &'a str,
    /// Import path of the declaring package.
    pub pkg_path: &'a str,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The link may be resolved.
    Permitted,
    /// The link is left unresolved.
    Rejected,
}

/// A set of package paths, matched exactly or by prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMatch {
    /// Paths matched exactly.
    pub exact: Vec<String>,
    /// Path prefixes.
    pub prefixes: Vec<String>,
}

impl PackageMatch {
    /// Matches exactly one path.
    pub fn exact(path: impl Into<String>) -> Self {
        Self {
            exact: vec![path.into()],
            prefixes: Vec::new(),
        }
    }

    /// Also matches `path`.
    pub fn or_exact(mut self, path: impl Into<String>) -> Self {
        self.exact.push(path.into());
        self
    }

    /// Also matches every path starting with `prefix`.
    pub fn or_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Returns `true` if `pkg_path` is in the set.
    pub fn matches(&self, pkg_path: &str) -> bool {
        self.exact.iter().any(|p| p == pkg_path)
            || self.prefixes.iter().any(|p| pkg_path.starts_with(p.as_str()))
    }
}

/// One rule of a [`LinkPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Permits these requesters from any package.
    AlwaysAllow(Vec<String>),
    /// Requests for `target` are decided here: permitted only from `from`.
    RestrictTarget {
        /// The guarded runtime symbol.
        target: String,
        /// Packages allowed to request it.
        from: PackageMatch,
    },
    /// Requests by `requester` are decided here: permitted only from `from`.
    RestrictRequester {
        /// The guarded magic identifier.
        requester: String,
        /// Packages allowed to declare it.
        from: PackageMatch,
    },
    /// Decides every request: permitted only from `from`.
    AllowFrom(PackageMatch),
}

impl Rule {
    /// The verdict if this rule applies to `req`, `None` otherwise.
    pub fn check(&self, req: &LinkRequest<'_>) -> Option<Verdict> {
        let permit = |ok: bool| if ok { Verdict::Permitted } else { Verdict::Rejected };
        match self {
            Rule::AlwaysAllow(requesters) => requesters
                .iter()
                .any(|r| r == req.requester)
                .then_some(Verdict::Permitted),
            Rule::RestrictTarget { target, from } => {
                (target == req.target).then(|| permit(from.matches(req.pkg_path)))
            }
            Rule::RestrictRequester { requester, from } => {
                (requester == req.requester).then(|| permit(from.matches(req.pkg_path)))
            }
            Rule::AllowFrom(from) => Some(permit(from.matches(req.pkg_path))),
        }
    }
}

/// Package paths the standard policy is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPaths {
    /// The runtime package; its subpackages may use every link.
    pub runtime_pkg: String,
    /// Prefix of test-support packages.
    pub test_prefix: String,
}

impl Default for LinkPaths {
    fn default() -> Self {
        Self {
            runtime_pkg: XGO_RUNTIME_PKG.to_string(),
            test_prefix: XGO_TEST_PKG_PREFIX.to_string(),
        }
    }
}

impl LinkPaths {
    /// The trap package, the only non-test home of the trap setter.
    pub fn trap_pkg(&self) -> String {
        format!("{}/trap", self.runtime_pkg)
    }

    fn runtime_prefix(&self) -> String {
        format!("{}/", self.runtime_pkg)
    }
}

/// Ordered rules deciding whether a package may use a link.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    disabled: bool,
    rules: Vec<Rule>,
}

impl LinkPolicy {
    /// A policy made of `rules`, evaluated in order.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            disabled: false,
            rules,
        }
    }

    /// The policy the patched compiler ships with.
    ///
    /// 1. compiler-generated requesters are always permitted;
    /// 2. the reflection setter only from `reflect`;
    /// 3. the trap setter only from the trap package or test support;
    /// 4. anything else only from `testing`, runtime subpackages or test support.
    pub fn standard(paths: &LinkPaths) -> Self {
        Self::new(vec![
            Rule::AlwaysAllow(vec![
                GENERATED_REGISTER_FUNC.to_string(),
                TRAP_FOR_GENERATED.to_string(),
            ]),
            Rule::RestrictTarget {
                target: REFLECT_SET_IMPL.to_string(),
                from: PackageMatch::exact("reflect"),
            },
            Rule::RestrictRequester {
                requester: SET_TRAP.to_string(),
                from: PackageMatch::exact(paths.trap_pkg()).or_prefix(paths.test_prefix.clone()),
            },
            Rule::AllowFrom(
                PackageMatch::exact("testing")
                    .or_prefix(paths.runtime_prefix())
                    .or_prefix(paths.test_prefix.clone()),
            ),
        ])
    }

    /// Sets the kill switch. A disabled policy rejects every request.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Returns `true` if the kill switch is set.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Decides `req`.
    pub fn check(&self, req: &LinkRequest<'_>) -> Verdict {
        if self.disabled {
            return Verdict::Rejected;
        }
        self.rules
            .iter()
            .find_map(|rule| rule.check(req))
            .unwrap_or(Verdict::Rejected)
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::standard(&LinkPaths::default())
    }
}
