use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Computed identity for one environment instance.
///
/// Derived deterministically from `(prefix, explicit suffix, filesystem
/// root)` — same inputs always yield the same identity, across processes.
/// This is what lets parallel worktrees pick non-colliding ports without
/// any coordination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevIdentity {
    /// Whether the root is a linked git worktree (not the primary copy).
    pub worktree: bool,
    /// Sanitized worktree name, when worktree isolation applies.
    pub worktree_suffix: Option<String>,
    /// `[explicit, worktree]` suffixes joined with `-`, explicit first.
    pub project_suffix: Option<String>,
    /// `{prefix}-{sanitize(basename(root))}` plus optional `-{suffix}`.
    pub project_name: String,
    /// Added to every declared base port. 0 for a primary checkout,
    /// 10..=99 for a worktree.
    pub port_offset: u16,
    /// Resolved filesystem root the identity was derived from.
    pub root: PathBuf,
}

/// Stable 32-bit hash of a string: first 4 bytes of SHA-256, big-endian.
///
/// Must stay a pure function of its input — the port offset derived from it
/// is the contract that keeps concurrent worktrees collision-free.
pub fn stable_hash(input: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hasher.finalize();
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Sanitize free text for use in an identity string: lowercase, collapse
/// every run of non `[a-z0-9]` into a single hyphen, strip leading/trailing
/// hyphens. An empty result falls back to `"worktree"`. Idempotent.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_hyphen = false;
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if out.is_empty() {
        "worktree".to_string()
    } else {
        out
    }
}

/// Walk up from `start` looking for the nearest directory whose manifest
/// declares a multi-package workspace. Returns `start` itself when nothing
/// is found — root discovery never fails.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if is_workspace_root(d) {
            return d.to_path_buf();
        }
        dir = d.parent();
    }
    start.to_path_buf()
}

fn is_workspace_root(dir: &Path) -> bool {
    if dir.join("pnpm-workspace.yaml").is_file() {
        return true;
    }
    if let Ok(pkg) = std::fs::read_to_string(dir.join("package.json")) {
        if pkg.contains("\"workspaces\"") {
            return true;
        }
    }
    if let Ok(manifest) = std::fs::read_to_string(dir.join("Cargo.toml")) {
        if manifest.contains("[workspace]") {
            return true;
        }
    }
    false
}

/// Detect whether `root` is a linked git worktree and return its raw name.
///
/// A linked worktree has `.git` as a *file* (the primary copy has a
/// directory) containing a `gitdir:` line pointing at
/// `.../worktrees/<name>`; the leaf segment is the worktree name.
pub fn detect_worktree(root: &Path) -> Option<String> {
    let git_path = root.join(".git");
    if !git_path.is_file() {
        return None;
    }
    let content = std::fs::read_to_string(&git_path).ok()?;
    let gitdir = content
        .lines()
        .find_map(|l| l.trim().strip_prefix("gitdir:"))?
        .trim();
    let gitdir = Path::new(gitdir);
    let name = gitdir.file_name()?.to_string_lossy().to_string();
    let parent = gitdir.parent()?.file_name()?.to_string_lossy().to_string();
    if parent == "worktrees" {
        Some(name)
    } else {
        None
    }
}

/// Compute the identity for a project rooted at `root` (defaults to the
/// nearest workspace root above the current directory).
///
/// The suffix ordering is a contract: the explicit suffix always precedes
/// the worktree-derived one, so downstream naming stays predictable.
pub fn compute_identity(
    prefix: &str,
    explicit_suffix: Option<&str>,
    root: Option<&Path>,
    worktree_isolation: bool,
) -> DevIdentity {
    let root = match root {
        Some(r) => find_workspace_root(r),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_workspace_root(&cwd)
        }
    };

    let worktree_name = detect_worktree(&root);
    let worktree = worktree_name.is_some();

    let worktree_suffix = if worktree_isolation {
        worktree_name.as_deref().map(sanitize_name)
    } else {
        None
    };

    let explicit = explicit_suffix.filter(|s| !s.is_empty()).map(sanitize_name);

    let parts: Vec<&str> = [explicit.as_deref(), worktree_suffix.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let project_suffix = if parts.is_empty() {
        None
    } else {
        Some(parts.join("-"))
    };

    let basename = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());
    let mut project_name = format!("{}-{}", prefix, sanitize_name(&basename));
    if let Some(suffix) = &project_suffix {
        project_name.push('-');
        project_name.push_str(suffix);
    }

    let port_offset = match &worktree_name {
        None => 0,
        Some(name) => {
            let key = match explicit_suffix.filter(|s| !s.is_empty()) {
                Some(suffix) => format!("{}-{}", name, suffix),
                None => name.clone(),
            };
            10 + (stable_hash(&key) % 90) as u16
        }
    };

    DevIdentity {
        worktree,
        worktree_suffix,
        project_suffix,
        project_name,
        port_offset,
        root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_worktree(dir: &Path, name: &str) {
        fs::write(
            dir.join(".git"),
            format!("gitdir: /repo/.git/worktrees/{}\n", name),
        )
        .unwrap();
    }

    #[test]
    fn sanitize_lowercases_and_hyphenates() {
        assert_eq!(sanitize_name("My_Project.Name"), "my-project-name");
        assert_eq!(sanitize_name("Feature_A"), "feature-a");
        assert_eq!(sanitize_name("foo///bar"), "foo-bar");
    }

    #[test]
    fn sanitize_strips_edge_hyphens() {
        assert_eq!(sanitize_name("--weird--"), "weird");
        assert_eq!(sanitize_name("_x_"), "x");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_name("My Branch (wip)");
        assert_eq!(sanitize_name(&once), once);
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_name(""), "worktree");
        assert_eq!(sanitize_name("***"), "worktree");
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(stable_hash("feature-a"), stable_hash("feature-a"));
        assert_ne!(stable_hash("feature-a"), stable_hash("feature-b"));
    }

    #[test]
    fn non_worktree_has_zero_offset() {
        let dir = tempfile::tempdir().unwrap();
        let id = compute_identity("myapp", None, Some(dir.path()), true);
        assert!(!id.worktree);
        assert_eq!(id.port_offset, 0);
        assert!(id.project_suffix.is_none());
    }

    #[test]
    fn worktree_offset_in_range() {
        // Worktree directory names are path leaves, so they never contain
        // a separator; spaces and mixed case do occur.
        for name in ["a", "feature-x", "Fix_Bug_123", "release 2.0"] {
            let dir = tempfile::tempdir().unwrap();
            make_worktree(dir.path(), name);
            let id = compute_identity("myapp", None, Some(dir.path()), true);
            assert!(
                (10..=99).contains(&id.port_offset),
                "offset {} out of range for {:?}",
                id.port_offset,
                name
            );
        }
    }

    #[test]
    fn identity_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        make_worktree(dir.path(), "feature-a");
        let a = compute_identity("myapp", Some("test"), Some(dir.path()), true);
        let b = compute_identity("myapp", Some("test"), Some(dir.path()), true);
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_suffix_precedes_worktree_suffix() {
        let dir = tempfile::tempdir().unwrap();
        make_worktree(dir.path(), "Feature_A");
        let id = compute_identity("myapp", Some("test"), Some(dir.path()), true);
        assert_eq!(id.project_suffix.as_deref(), Some("test-feature-a"));
    }

    #[test]
    fn isolation_disabled_suppresses_worktree_suffix() {
        let dir = tempfile::tempdir().unwrap();
        make_worktree(dir.path(), "feature-a");
        let id = compute_identity("myapp", None, Some(dir.path()), false);
        assert!(id.worktree);
        assert!(id.worktree_suffix.is_none());
        assert!(id.project_suffix.is_none());
        // Offset still applies: the checkout is a worktree either way.
        assert!((10..=99).contains(&id.port_offset));
    }

    #[test]
    fn project_name_includes_sanitized_basename_and_suffix() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("My_App");
        fs::create_dir(&root).unwrap();
        make_worktree(&root, "fix");
        let id = compute_identity("shop", Some("e2e"), Some(&root), true);
        assert_eq!(id.project_name, "shop-my-app-e2e-fix");
    }

    #[test]
    fn suffix_changes_offset() {
        let dir = tempfile::tempdir().unwrap();
        make_worktree(dir.path(), "feature-a");
        let plain = compute_identity("myapp", None, Some(dir.path()), true);
        let suffixed = compute_identity("myapp", Some("test"), Some(dir.path()), true);
        // Hash key includes the explicit suffix, so two suffixed
        // environments in the same worktree get independent offsets.
        assert_eq!(plain.port_offset, 10 + (stable_hash("feature-a") % 90) as u16);
        assert_eq!(
            suffixed.port_offset,
            10 + (stable_hash("feature-a-test") % 90) as u16
        );
    }

    #[test]
    fn primary_checkout_git_dir_is_not_a_worktree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(detect_worktree(dir.path()).is_none());
    }

    #[test]
    fn gitdir_outside_worktrees_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".git"), "gitdir: /somewhere/else/main\n").unwrap();
        assert!(detect_worktree(dir.path()).is_none());
    }

    #[test]
    fn workspace_root_found_from_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pnpm-workspace.yaml"), "packages:\n  - '*'\n").unwrap();
        let nested = dir.path().join("packages/api/src");
        fs::create_dir_all(&nested).unwrap();
        let found = find_workspace_root(&nested);
        assert_eq!(found, dir.path());
    }
}
