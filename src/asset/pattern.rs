//! Include / ignore glob matching over file keys.
//!
//! Patterns use `glob` syntax with literal separators, plus `{a,b}`
//! alternation. A pattern without `/` is matched against every path
//! segment, so `node_modules` or `*.swp` apply at any depth.

use glob::{MatchOptions, Pattern, PatternError};

use super::FileKey;

/// Files and directories never treated as project files.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".vscode",
    ".hg",
    ".bzr",
    ".svn",
    "_darcs",
    "CVS",
    ".DS_Store",
    ".sass-cache",
    "Thumbs.db",
    "desktop.ini",
    "config.yml",
    "node_modules",
    ".prettierrc.json",
    "*.swp",
    "*.swo",
    "*.swx",
    "*.tmp",
    "*.bak",
    "*~",
    ".#*",
];

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled glob plus whether it applies per segment.
#[derive(Debug, Clone)]
struct Glob {
    pattern: Pattern,
    anchored: bool,
}

impl Glob {
    fn compile(raw: &str) -> Result<Vec<Self>, PatternError> {
        let raw = raw.trim().trim_start_matches("./");
        let anchored = raw.contains('/');
        expand_braces(raw.trim_start_matches('/'))
            .iter()
            .map(|p| {
                Pattern::new(p).map(|pattern| Self { pattern, anchored })
            })
            .collect()
    }

    fn matches(&self, path: &str) -> bool {
        if self.anchored {
            return self.pattern.matches_with(path, OPTIONS);
        }
        path.split('/')
            .any(|segment| self.pattern.matches_with(segment, OPTIONS))
    }
}

/// Include / ignore filter for file keys.
///
/// An empty include list admits everything not ignored.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    include: Vec<Glob>,
    ignore: Vec<Glob>,
}

impl PathMatcher {
    pub fn new<I, G>(include: I, ignore: G) -> Result<Self, PatternError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        G: IntoIterator,
        G::Item: AsRef<str>,
    {
        let mut matcher = Self::default();
        for raw in include {
            matcher.include.extend(Glob::compile(raw.as_ref())?);
        }
        for raw in ignore {
            matcher.ignore.extend(Glob::compile(raw.as_ref())?);
        }
        Ok(matcher)
    }

    /// Add the built-in ignore list.
    pub fn with_default_ignores(mut self) -> Self {
        for raw in DEFAULT_IGNORE {
            // Built-in patterns are static and known to compile
            if let Ok(globs) = Glob::compile(raw) {
                self.ignore.extend(globs);
            }
        }
        self
    }

    /// True when the key or one of its ancestors matches an ignore pattern.
    pub fn is_ignored(&self, key: &FileKey) -> bool {
        key.ancestors()
            .chain(std::iter::once(key.as_str()))
            .any(|path| self.ignore.iter().any(|g| g.matches(path)))
    }

    /// True when the key passes both the include and the ignore lists.
    pub fn is_match(&self, key: &FileKey) -> bool {
        if self.is_ignored(key) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|g| g.matches(key.as_str()))
    }
}

/// Expand `{a,b}` groups into separate patterns (nested groups allowed).
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    // Find the matching close brace
    let mut depth = 0;
    let mut close = None;
    for (idx, ch) in pattern[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let (prefix, body, suffix) = (&pattern[..open], &pattern[open + 1..close], &pattern[close + 1..]);

    // Split the body on top-level commas
    let mut alternatives = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (idx, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                alternatives.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    alternatives.push(&body[start..]);

    alternatives
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}
