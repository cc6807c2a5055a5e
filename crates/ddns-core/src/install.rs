//! First-run installer
//!
//! Scaffolds the credentials and zones files with placeholder content so
//! the operator only has to fill in real values. Existing files are never
//! touched.

use crate::config::{Credential, CredentialsFile, ZoneEntry, ZonesFile};
use crate::error::Result;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Fixed install location
pub const DEFAULT_INSTALL_DIR: &str = "/etc/bddns";

/// File name of the credentials document
pub const USERS_FILE_NAME: &str = "users.conf";

/// File name of the zones document
pub const SITES_FILE_NAME: &str = "sites.conf";

/// What the installer did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Placeholder credentials document
pub fn default_users() -> CredentialsFile {
    CredentialsFile {
        users: vec![
            Credential::new("user@email.com", "<KEY>"),
            Credential::new("another-user@email.com", "<KEY>"),
        ],
    }
}

/// Placeholder zones document
pub fn default_sites() -> ZonesFile {
    ZonesFile {
        ip_provider: "https://api.ipify.org/".to_string(),
        api_base: None,
        zones: vec![ZoneEntry {
            zone: Some("<zone_name.tld>".to_string()),
            id: None,
            username: "user@email.com".to_string(),
            records: vec!["site.tld".to_string(), "subdomain.site.tld".to_string()],
        }],
    }
}

/// Write both default documents into `dir`, creating it if needed
pub fn install(dir: impl AsRef<Path>) -> Result<InstallReport> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut report = InstallReport::default();
    write_if_absent(&dir.join(USERS_FILE_NAME), &default_users(), &mut report)?;
    write_if_absent(&dir.join(SITES_FILE_NAME), &default_sites(), &mut report)?;

    Ok(report)
}

/// Create `path` holding `document`; the open itself refuses to replace an existing file
fn write_if_absent<T: Serialize>(path: &Path, document: &T, report: &mut InstallReport) -> Result<()> {
    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    document.serialize(&mut serializer)?;
    body.push(b'\n');

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::warn!("{} already exists, skipping", path.display());
            report.skipped.push(path.to_path_buf());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(&body)?;
    tracing::info!("Wrote {}", path.display());
    report.created.push(path.to_path_buf());
    Ok(())
}
