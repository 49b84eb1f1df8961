//! Local record table with file-backed persistence for learned entries.
//!
//! Static records come from the record file at startup. Records learned
//! from upstream answers go into per-family dynamic tables and are appended
//! to the same file; they are kept for the process lifetime with no TTL.

use crate::dns::wire::RecordType;
use crate::error::RelayError;
use dashmap::DashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Literal marking a domain as intercepted: always answered NXDOMAIN
pub const INTERCEPT_SENTINEL: &str = "0.0.0.0";

/// Whether a stored literal is the intercept sentinel
pub fn is_intercepted(literal: &str) -> bool {
    literal == INTERCEPT_SENTINEL
}

/// In-memory record table, keyed by lowercase domain name.
pub struct RecordStore {
    statics: DashMap<String, String>,
    dynamic_v4: DashMap<String, String>,
    dynamic_v6: DashMap<String, String>,
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl RecordStore {
    /// Load the record file. An unreadable file is not fatal: the relay
    /// starts with an empty static table and a warning.
    pub fn load(path: impl AsRef<Path>) -> RecordStore {
        let store = RecordStore {
            statics: DashMap::new(),
            dynamic_v4: DashMap::new(),
            dynamic_v6: DashMap::new(),
            path: path.as_ref().to_path_buf(),
            append_lock: Mutex::new(()),
        };

        match store.read_static() {
            Ok(count) => {
                info!(path = %store.path.display(), records = count, "loaded record file")
            }
            Err(e) => warn!(
                path = %store.path.display(),
                error = %e,
                "record file unavailable, starting with empty table"
            ),
        }

        store
    }

    fn read_static(&self) -> io::Result<usize> {
        let content = fs::read_to_string(&self.path)?;
        self.statics.clear();

        let mut count = 0usize;
        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(domain), Some(literal))
                    if is_valid_domain(domain) && literal.parse::<IpAddr>().is_ok() =>
                {
                    self.statics
                        .insert(domain.to_ascii_lowercase(), literal.to_string());
                    count += 1;
                }
                _ => warn!(line = idx + 1, content = line, "skipping malformed record line"),
            }
        }

        Ok(count)
    }

    /// Re-read the static table from the record file. Dynamic tables are
    /// left untouched.
    pub fn reload(&self) -> Result<usize, RelayError> {
        let count = self.read_static().map_err(|e| {
            RelayError::Store(format!("reload {}: {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), records = count, "reloaded record file");
        Ok(count)
    }

    /// Look up a name, case-insensitively.
    ///
    /// The static table wins regardless of query type. Otherwise the
    /// dynamic table matching the query's family is consulted; for types
    /// other than A and AAAA, v4 is tried first, then v6.
    pub fn lookup(&self, name: &str, qtype: RecordType) -> Option<String> {
        let key = name.to_ascii_lowercase();

        if let Some(hit) = self.statics.get(&key) {
            return Some(hit.value().clone());
        }

        match qtype {
            RecordType::A => self.dynamic_v4.get(&key).map(|r| r.value().clone()),
            RecordType::AAAA => self.dynamic_v6.get(&key).map(|r| r.value().clone()),
            _ => self
                .dynamic_v4
                .get(&key)
                .map(|r| r.value().clone())
                .or_else(|| self.dynamic_v6.get(&key).map(|r| r.value().clone())),
        }
    }

    /// Store a record learned from an upstream answer and append it to the
    /// record file. The family table is chosen by the record type, falling
    /// back to the literal's textual form for other types. Persist failures
    /// are logged and swallowed: the response itself must still be relayed.
    pub fn save(&self, name: &str, literal: &str, rtype: RecordType) {
        if !is_valid_domain(name) || literal.parse::<IpAddr>().is_err() {
            warn!(name, literal, "refusing to save invalid learned record");
            return;
        }

        let key = name.to_ascii_lowercase();
        let into_v6 = match rtype {
            RecordType::A => false,
            RecordType::AAAA => true,
            _ => literal.contains(':'),
        };

        if into_v6 {
            self.dynamic_v6.insert(key, literal.to_string());
        } else {
            self.dynamic_v4.insert(key, literal.to_string());
        }
        info!(name, literal, rtype = %rtype, "learned upstream record");

        if let Err(e) = self.append_record(name, literal) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist learned record"
            );
        }
    }

    /// Append `<name> <literal>` to the record file, first making sure the
    /// file's current last byte is a line terminator so the previous line
    /// is never corrupted.
    fn append_record(&self, name: &str, literal: &str) -> io::Result<()> {
        let _guard = self.append_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut line = String::new();
        if let Ok(mut existing) = File::open(&self.path) {
            let len = existing.metadata()?.len();
            if len > 0 {
                existing.seek(SeekFrom::End(-1))?;
                let mut last = [0u8; 1];
                existing.read_exact(&mut last)?;
                if last[0] != b'\n' && last[0] != b'\r' {
                    line.push('\n');
                }
            }
        }

        line.push_str(name);
        line.push(' ');
        line.push_str(literal);
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        debug!(name, literal, "appended learned record to file");
        Ok(())
    }

    /// Number of static records loaded from the file
    pub fn static_len(&self) -> usize {
        self.statics.len()
    }

    /// Number of dynamic records learned so far
    pub fn dynamic_len(&self) -> usize {
        self.dynamic_v4.len() + self.dynamic_v6.len()
    }
}

/// Basic syntactic check on a domain name: dot-separated labels of
/// alphanumerics and hyphens, no hyphen at a label edge.
fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}
