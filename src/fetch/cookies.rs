//! Scoped Netscape cookie files
//!
//! The extraction engine takes credentials as a Netscape-format cookie file.
//! Configuration carries them as a single "name=value; name2=value2" string;
//! this module materializes that string into a temporary file whose lifetime
//! is tied to the fetch. The file is removed on drop, on every exit path.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n";
const COOKIE_DOMAIN: &str = ".youtube.com";
// Far-future expiry; the engine only checks that it is not in the past
const COOKIE_EXPIRY: &str = "2999999999";

/// A cookie file that exists only while this value is alive
#[derive(Debug)]
pub struct CookieJarFile {
    file: NamedTempFile,
}

impl CookieJarFile {
    /// Materialize the configured cookie string into a temporary file
    ///
    /// Returns `None` when the string holds no usable "name=value" pairs.
    /// Malformed fragments (no `=`) are skipped.
    pub fn from_config_string(raw: &str) -> std::io::Result<Option<Self>> {
        let pairs: Vec<(&str, &str)> = raw
            .split(';')
            .filter_map(|fragment| {
                let fragment = fragment.trim();
                let (name, value) = fragment.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    None
                } else {
                    Some((name, value.trim()))
                }
            })
            .collect();

        if pairs.is_empty() {
            return Ok(None);
        }

        let mut file = NamedTempFile::new()?;
        file.write_all(NETSCAPE_HEADER.as_bytes())?;
        for (name, value) in pairs {
            writeln!(
                file,
                "{COOKIE_DOMAIN}\tTRUE\t/\tTRUE\t{COOKIE_EXPIRY}\t{name}\t{value}"
            )?;
        }
        file.flush()?;
        Ok(Some(Self { file }))
    }

    /// Path to pass to the extraction engine
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_produces_no_file() {
        assert!(CookieJarFile::from_config_string("").unwrap().is_none());
        assert!(CookieJarFile::from_config_string("  ; ;").unwrap().is_none());
    }

    #[test]
    fn pairs_render_as_netscape_rows() {
        let jar = CookieJarFile::from_config_string("SID=abc123; HSID=xyz")
            .unwrap()
            .unwrap();
        let contents = std::fs::read_to_string(jar.path()).unwrap();

        assert!(contents.starts_with("# Netscape HTTP Cookie File"));
        assert!(contents.contains(".youtube.com\tTRUE\t/\tTRUE\t2999999999\tSID\tabc123"));
        assert!(contents.contains("\tHSID\txyz"));
    }

    #[test]
    fn malformed_fragments_are_skipped() {
        let jar = CookieJarFile::from_config_string("garbage; SID=ok; =novalue")
            .unwrap()
            .unwrap();
        let contents = std::fs::read_to_string(jar.path()).unwrap();

        assert!(contents.contains("\tSID\tok"));
        assert!(!contents.contains("garbage"));
        assert!(!contents.contains("novalue"));
    }

    #[test]
    fn file_is_removed_on_drop() {
        let jar = CookieJarFile::from_config_string("SID=abc").unwrap().unwrap();
        let path = jar.path().to_path_buf();
        assert!(path.exists());

        drop(jar);
        assert!(!path.exists(), "cookie file must not outlive the fetch");
    }
}
