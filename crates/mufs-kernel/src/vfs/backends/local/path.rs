//! Native path syntax for the local backend.
//!
//! Kept free of I/O and parameterised by [`PathStyle`] so the drive-letter
//! rules are exercised on every host.

use mufs_types::{FileUrl, UrlError};

use crate::vfs::error::{VfsError, VfsResult};

/// Path family of the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStyle {
    /// One tree rooted at `/`.
    Posix,
    /// A tree per drive letter (`C:\`) plus UNC shares (`\\server\share`).
    DriveLetter,
}

impl PathStyle {
    pub const fn native() -> Self {
        if cfg!(windows) { PathStyle::DriveLetter } else { PathStyle::Posix }
    }

    pub const fn separator(self) -> &'static str {
        match self {
            PathStyle::Posix => "/",
            PathStyle::DriveLetter => "\\",
        }
    }

    fn separator_char(self) -> char {
        match self {
            PathStyle::Posix => '/',
            PathStyle::DriveLetter => '\\',
        }
    }

    /// Native absolute path of a `file` URL: no trailing separator except at a
    /// root.
    pub fn url_to_native(self, url: &FileUrl) -> VfsResult<String> {
        match self {
            PathStyle::Posix => {
                if !url.is_local() {
                    return Err(VfsError::other(format!("network share not reachable on this platform: {url}")));
                }
                Ok(url.path().to_string())
            }
            PathStyle::DriveLetter => {
                if url.is_unc() {
                    let host = url.host().unwrap_or_default();
                    let rest = url.path().trim_end_matches('/').replace('/', "\\");
                    return Ok(format!(r"\\{host}{rest}"));
                }
                if url.drive().is_none() {
                    return Err(UrlError::NotAbsolute(url.path().to_string()).into());
                }
                // `/C:/dir` → `C:\dir`, `/C:/` → `C:\`
                let native = url.path()[1..].replace('/', "\\");
                Ok(self.trim_trailing_separator(&native))
            }
        }
    }

    /// Remove trailing separators unless the path is a root.
    pub fn trim_trailing_separator(self, path: &str) -> String {
        let sep = self.separator_char();
        let trimmed = path.trim_end_matches(sep);
        match self {
            PathStyle::Posix if trimmed.is_empty() => "/".to_string(),
            PathStyle::DriveLetter if trimmed.len() == 2 && trimmed.ends_with(':') => format!("{trimmed}{sep}"),
            _ => trimmed.to_string(),
        }
    }

    pub fn is_root(self, path: &str) -> bool {
        match self {
            PathStyle::Posix => path == "/",
            PathStyle::DriveLetter => is_drive_root(path) || unc_share_root(path).is_some_and(|root| root == path),
        }
    }

    /// URL path of the root above `url`.
    pub fn root_url_path(self, url: &FileUrl) -> String {
        match self {
            PathStyle::Posix => "/".to_string(),
            PathStyle::DriveLetter => {
                if let Some(drive) = url.drive() {
                    return format!("/{drive}:/");
                }
                let share = url.path().split('/').find(|s| !s.is_empty()).unwrap_or_default();
                format!("/{share}")
            }
        }
    }

    /// Root component of a native path (`/`, `C:\`, `\\server\share`).
    pub fn root_of(self, path: &str) -> String {
        match self {
            PathStyle::Posix => "/".to_string(),
            PathStyle::DriveLetter => {
                if let Some(root) = unc_share_root(path) {
                    return root.to_string();
                }
                path.get(..2).map(|drive| format!("{drive}\\")).unwrap_or_default()
            }
        }
    }

    /// True if both paths live under the same root (drive letters compare
    /// case-insensitively).
    pub fn same_root(self, a: &str, b: &str) -> bool {
        let (a, b) = (self.root_of(a), self.root_of(b));
        match self {
            PathStyle::Posix => a == b,
            PathStyle::DriveLetter => a.eq_ignore_ascii_case(&b),
        }
    }

    /// Display name: the last segment, `/` for the POSIX root, `C:` for a drive.
    pub fn name_of(self, path: &str) -> String {
        if self.is_root(path) {
            return match self {
                PathStyle::Posix => "/".to_string(),
                PathStyle::DriveLetter => path.trim_end_matches('\\').to_string(),
            };
        }
        let sep = self.separator_char();
        path.trim_end_matches(sep).rsplit(sep).next().unwrap_or_default().to_string()
    }
}

/// `C:\`
fn is_drive_root(path: &str) -> bool {
    let b = path.as_bytes();
    b.len() == 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'\\'
}

/// `\\server\share` prefix of a UNC path.
fn unc_share_root(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(r"\\")?;
    let server_end = rest.find('\\')?;
    let share = &rest[server_end + 1..];
    let share_end = share.find('\\').unwrap_or(share.len());
    if share_end == 0 {
        return None;
    }
    Some(&path[..2 + server_end + 1 + share_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> FileUrl {
        FileUrl::parse(s).unwrap()
    }

    #[test]
    fn test_posix_paths() {
        let style = PathStyle::Posix;
        assert_eq!(style.url_to_native(&url("/home/u/")).unwrap(), "/home/u");
        assert_eq!(style.url_to_native(&url("/")).unwrap(), "/");
        assert!(style.is_root("/"));
        assert!(!style.is_root("/home"));
        assert_eq!(style.name_of("/home/u/notes.txt"), "notes.txt");
        assert_eq!(style.name_of("/"), "/");
        assert_eq!(style.trim_trailing_separator("/home/u//"), "/home/u");
        assert_eq!(style.trim_trailing_separator("//"), "/");
        assert!(style.url_to_native(&url(r"\\server\share")).is_err());
    }

    #[test]
    fn test_same_root() {
        assert!(PathStyle::Posix.same_root("/tmp/a", "/dev/shm/b"));

        let style = PathStyle::DriveLetter;
        assert!(style.same_root(r"C:\Users\a", r"c:\Temp\b"));
        assert!(!style.same_root(r"C:\Users\a", r"D:\Users\a"));
        assert!(style.same_root(r"\\server\share\a", r"\\server\share\b\c"));
        assert!(!style.same_root(r"\\server\share\a", r"\\server\other\a"));
        assert!(!style.same_root(r"\\server\share\a", r"C:\a"));
    }

    #[test]
    fn test_drive_paths() {
        let style = PathStyle::DriveLetter;
        assert_eq!(style.url_to_native(&url(r"C:\Users\u\")).unwrap(), r"C:\Users\u");
        assert_eq!(style.url_to_native(&url("C:")).unwrap(), r"C:\");
        assert!(style.is_root(r"C:\"));
        assert!(!style.is_root(r"C:\Users"));
        assert_eq!(style.name_of(r"C:\"), "C:");
        assert_eq!(style.name_of(r"C:\Users\u"), "u");
        assert_eq!(style.root_of(r"C:\Users\u"), r"C:\");
        assert_eq!(style.root_url_path(&url(r"D:\x\y")), "/D:/");
        assert!(style.url_to_native(&url("/home")).is_err());
    }

    #[test]
    fn test_unc_paths() {
        let style = PathStyle::DriveLetter;
        let u = url(r"\\server\share\dir");
        assert_eq!(style.url_to_native(&u).unwrap(), r"\\server\share\dir");
        assert_eq!(style.root_of(r"\\server\share\dir"), r"\\server\share");
        assert!(style.is_root(r"\\server\share"));
        assert!(!style.is_root(r"\\server\share\dir"));
        assert_eq!(style.root_url_path(&u), "/share");
    }
}
