//! Install names: the canonical storage key of a script.
//!
//! An install name looks like `alice/tools/myscript.user.js`. It is derived
//! only from the author's name and the header's `@namespace` and `@name`, so
//! the same author publishing the same script always lands on the same key.

use crate::error::{CanonicalizeError, Error, Result};
use crate::sanitize::FilenameSanitizer;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Suffix of every stored script.
pub const SCRIPT_SUFFIX: &str = ".user.js";

/// Suffix of the metadata-only twin of a script.
pub const META_SUFFIX: &str = ".meta.js";

/// Canonical `user/[namespace/]name.user.js` key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstallName(String);

impl InstallName {
    /// Build an install name from delivery route segments.
    ///
    /// Only the username segment is lower-cased. The other segments are
    /// taken as given, since they were sanitized when the script was stored.
    pub fn from_route(username: &str, namespace: Option<&str>, script: &str) -> Result<Self> {
        let mut name = username.to_lowercase();
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            name.push('/');
            name.push_str(ns);
        }
        name.push('/');
        name.push_str(script);
        name.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map a `.meta.js` name back to the script it describes.
    ///
    /// Returns `None` if the name carries no meta suffix.
    pub fn strip_meta_suffix(&self) -> Option<InstallName> {
        self.0
            .strip_suffix(META_SUFFIX)
            .map(|base| InstallName(format!("{base}{SCRIPT_SUFFIX}")))
    }
}

impl FromStr for InstallName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut segments = 0;
        for segment in s.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(Error::InvalidInstallName(s.to_string()));
            }
            segments += 1;
        }
        if !(2..=3).contains(&segments) {
            return Err(Error::InvalidInstallName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for InstallName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstallName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<InstallName> for String {
    fn from(name: InstallName) -> Self {
        name.0
    }
}

/// Derive the install name for a script.
///
/// The namespace segment is dropped when it is empty or when it names the
/// author again. A namespace never ends in `.user.js` or `.meta.js`; those
/// suffixes are stripped so a namespace directory cannot take the key of a
/// script file. Fails with [`CanonicalizeError::MissingName`] when nothing
/// usable is left of the script name.
pub fn canonicalize(
    sanitizer: &dyn FilenameSanitizer,
    username: &str,
    namespace: Option<&str>,
    script_name: &str,
) -> std::result::Result<InstallName, CanonicalizeError> {
    let script = sanitizer.clean(script_name);
    if script.is_empty() {
        return Err(CanonicalizeError::MissingName);
    }

    let user = sanitizer.clean(username).to_lowercase();
    let namespace = namespace
        .map(|ns| clean_namespace(sanitizer, ns))
        .filter(|ns| !ns.is_empty() && *ns != user);

    let mut path = user;
    if let Some(ns) = namespace {
        path.push('/');
        path.push_str(&ns);
    }
    path.push('/');
    path.push_str(&script);
    path.push_str(SCRIPT_SUFFIX);
    Ok(InstallName(path))
}

fn clean_namespace(sanitizer: &dyn FilenameSanitizer, raw: &str) -> String {
    let mut ns = sanitizer.clean(raw);
    while let Some(base) = ns
        .strip_suffix(SCRIPT_SUFFIX)
        .or_else(|| ns.strip_suffix(META_SUFFIX))
    {
        ns = base.to_string();
    }
    ns
}
