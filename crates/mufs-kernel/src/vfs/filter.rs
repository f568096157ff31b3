//! Filename filters for [`FileObject::ls_filtered`](crate::vfs::FileObject::ls_filtered).

use regex::Regex;

use crate::vfs::error::{VfsError, VfsResult};

/// Decides whether a child name is kept by a listing.
pub trait FilenameFilter: Send + Sync {
    fn accept(&self, name: &str) -> bool;
}

impl<F> FilenameFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accept(&self, name: &str) -> bool {
        self(name)
    }
}

/// Accepts names ending in one of a set of extensions.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    case_sensitive: bool,
    inverted: bool,
}

impl ExtensionFilter {
    /// Extensions are given without the leading dot. Matching is case-insensitive.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            case_sensitive: false,
            inverted: false,
        }
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Accept exactly the names the plain filter would reject.
    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }

    fn matches(&self, name: &str) -> bool {
        let Some((stem, ext)) = name.rsplit_once('.') else {
            return false;
        };
        if stem.is_empty() {
            return false;
        }
        self.extensions.iter().any(|wanted| {
            if self.case_sensitive {
                wanted == ext
            } else {
                wanted.eq_ignore_ascii_case(ext)
            }
        })
    }
}

impl FilenameFilter for ExtensionFilter {
    fn accept(&self, name: &str) -> bool {
        self.matches(name) != self.inverted
    }
}

/// Shell-style `*` and `?` pattern over the whole name.
#[derive(Debug, Clone)]
pub struct WildcardFilter {
    regex: Regex,
}

impl WildcardFilter {
    pub fn new(pattern: &str, case_sensitive: bool) -> VfsResult<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        if !case_sensitive {
            source.push_str("(?i)");
        }
        source.push('^');
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                c => source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| VfsError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }
}

impl FilenameFilter for WildcardFilter {
    fn accept(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Names matching a regular expression (unanchored unless the pattern anchors).
#[derive(Debug, Clone)]
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> VfsResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| VfsError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }
}

impl FilenameFilter for RegexFilter {
    fn accept(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Accepts names every inner filter accepts. Empty accepts everything.
#[derive(Default)]
pub struct AndFilter {
    filters: Vec<Box<dyn FilenameFilter>>,
}

impl AndFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: impl FilenameFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl FilenameFilter for AndFilter {
    fn accept(&self, name: &str) -> bool {
        self.filters.iter().all(|f| f.accept(name))
    }
}

/// Accepts names any inner filter accepts. Empty accepts everything.
#[derive(Default)]
pub struct OrFilter {
    filters: Vec<Box<dyn FilenameFilter>>,
}

impl OrFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: impl FilenameFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl FilenameFilter for OrFilter {
    fn accept(&self, name: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.accept(name))
    }
}
