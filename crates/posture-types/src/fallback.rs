//! # Fallback Views
//!
//! Static compliance data shown whenever live synchronization is disabled or
//! has not delivered a snapshot yet. It is derived from the collaborator
//! records on disk: the self-test report and the build manifest.
//!
//! Layout of the derived view:
//!
//! - one `build` section from the manifest (version, each crypto module,
//!   SBOM and binary digests)
//! - one section per self-test category, in first-seen order

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::compliance::{CheckStatus, ComplianceItem, ComplianceSection, ComplianceView};
use crate::fleet::FleetView;
use crate::manifest::BuildManifest;
use crate::selftest::SelfTestReport;

/// Section id used for manifest-derived items.
pub const BUILD_SECTION_ID: &str = "build";

/// Errors loading collaborator records.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// File is not the expected JSON record
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, FallbackError> {
    let content = fs::read_to_string(path).map_err(|source| FallbackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| FallbackError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a self-test report from a JSON file.
pub fn load_self_test_report(path: &Path) -> Result<SelfTestReport, FallbackError> {
    load_json(path)
}

/// Load a build manifest from a JSON file.
pub fn load_manifest(path: &Path) -> Result<BuildManifest, FallbackError> {
    load_json(path)
}

/// Load a ready-made compliance view from a JSON file.
pub fn load_compliance_view(path: &Path) -> Result<ComplianceView, FallbackError> {
    load_json(path)
}

/// Load a ready-made fleet view from a JSON file.
pub fn load_fleet_view(path: &Path) -> Result<FleetView, FallbackError> {
    load_json(path)
}

fn presence(value: Option<&str>) -> CheckStatus {
    match value {
        Some(v) if !v.trim().is_empty() => CheckStatus::Pass,
        _ => CheckStatus::Unknown,
    }
}

fn build_section(manifest: &BuildManifest) -> ComplianceSection {
    let mut items = Vec::with_capacity(manifest.crypto_modules.len() + 3);

    let mut version = ComplianceItem::new("version", presence(Some(&manifest.version)))
        .with_label("Client version");
    if !manifest.version.is_empty() {
        version = version.with_detail(manifest.version.clone());
    }
    items.push(version);

    if manifest.crypto_modules.is_empty() {
        items.push(
            ComplianceItem::new("crypto-module", CheckStatus::Fail)
                .with_label("Cryptographic module")
                .with_detail("no cryptographic module recorded"),
        );
    }
    for module in &manifest.crypto_modules {
        // A module without a certificate number is linked but not validated.
        let (status, detail) = match &module.certificate {
            Some(cert) => (CheckStatus::Pass, format!("certificate #{cert}")),
            None => (CheckStatus::Warning, "no validation certificate".to_string()),
        };
        items.push(
            ComplianceItem::new(format!("module:{}", module.name), status)
                .with_label(module.name.clone())
                .with_detail(detail),
        );
    }

    items.push(
        ComplianceItem::new("sbom-digest", presence(manifest.sbom_digest.as_deref()))
            .with_label("SBOM digest"),
    );
    items.push(
        ComplianceItem::new("binary-digest", presence(manifest.binary_digest.as_deref()))
            .with_label("Binary digest"),
    );

    ComplianceSection::new(BUILD_SECTION_ID, items).with_title("Build")
}

fn self_test_sections(report: &SelfTestReport) -> Vec<ComplianceSection> {
    let mut sections: Vec<ComplianceSection> = Vec::new();
    for check in &report.checks {
        let mut item = ComplianceItem::new(check.id.clone(), check.result.into());
        if let Some(name) = &check.name {
            item = item.with_label(name.clone());
        }
        if let Some(detail) = &check.detail {
            item = item.with_detail(detail.clone());
        }

        match sections.iter_mut().find(|s| s.id == check.category) {
            // Later duplicates of a check id would break item identity.
            Some(section) if section.item(&item.id).is_some() => {}
            Some(section) => section.items.push(item),
            None => sections.push(ComplianceSection::new(check.category.clone(), vec![item])),
        }
    }
    sections
}

/// Derive the fallback compliance view from whichever records are available.
pub fn compliance_fallback(
    report: Option<&SelfTestReport>,
    manifest: Option<&BuildManifest>,
) -> ComplianceView {
    let mut sections = Vec::new();
    if let Some(manifest) = manifest {
        sections.push(build_section(manifest));
    }
    if let Some(report) = report {
        // Section ids must stay unique; the manifest owns `build`.
        sections.extend(
            self_test_sections(report)
                .into_iter()
                .filter(|s| s.id != BUILD_SECTION_ID || manifest.is_none()),
        );
    }
    ComplianceView::new(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CryptoModule;
    use crate::selftest::{SelfTestCheck, SelfTestOutcome};
    use std::io::Write;

    fn check(id: &str, category: &str, result: SelfTestOutcome) -> SelfTestCheck {
        SelfTestCheck {
            id: id.to_string(),
            category: category.to_string(),
            name: None,
            result,
            detail: None,
        }
    }

    #[test]
    fn groups_checks_by_category_in_first_seen_order() {
        let report = SelfTestReport {
            generated_at: None,
            checks: vec![
                check("kat-aes", "crypto", SelfTestOutcome::Pass),
                check("tls-min", "transport", SelfTestOutcome::Fail),
                check("kat-sha", "crypto", SelfTestOutcome::Skipped),
                check("kat-aes", "crypto", SelfTestOutcome::Fail),
            ],
        };
        let view = compliance_fallback(Some(&report), None);
        assert_eq!(view.section_count(), 2);
        assert_eq!(view.sections()[0].id, "crypto");
        assert_eq!(view.sections()[0].items.len(), 2);
        assert_eq!(view.item("crypto", "kat-aes").unwrap().status, CheckStatus::Pass);
        assert_eq!(view.item("crypto", "kat-sha").unwrap().status, CheckStatus::Unknown);
        assert_eq!(view.item("transport", "tls-min").unwrap().status, CheckStatus::Fail);
    }

    #[test]
    fn manifest_becomes_build_section() {
        let manifest = BuildManifest {
            version: "1.4.0".to_string(),
            crypto_modules: vec![
                CryptoModule {
                    name: "openssl-fips".to_string(),
                    version: Some("3.0.9".to_string()),
                    certificate: Some("4282".to_string()),
                },
                CryptoModule {
                    name: "boringcrypto".to_string(),
                    version: None,
                    certificate: None,
                },
            ],
            sbom_digest: Some("sha256:aa".to_string()),
            ..Default::default()
        };
        let view = compliance_fallback(None, Some(&manifest));
        let build = view.section(BUILD_SECTION_ID).unwrap();
        assert_eq!(build.item("version").unwrap().status, CheckStatus::Pass);
        assert_eq!(build.item("module:openssl-fips").unwrap().status, CheckStatus::Pass);
        assert_eq!(build.item("module:boringcrypto").unwrap().status, CheckStatus::Warning);
        assert_eq!(build.item("sbom-digest").unwrap().status, CheckStatus::Pass);
        assert_eq!(build.item("binary-digest").unwrap().status, CheckStatus::Unknown);
    }

    #[test]
    fn missing_modules_fail_the_build_section() {
        let manifest = BuildManifest {
            version: "1.4.0".to_string(),
            ..Default::default()
        };
        let view = compliance_fallback(None, Some(&manifest));
        assert_eq!(view.item(BUILD_SECTION_ID, "crypto-module").unwrap().status, CheckStatus::Fail);
        assert_eq!(view.verdict(), CheckStatus::Fail);
    }

    #[test]
    fn loads_records_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selftest.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"checks":[{{"id":"kat","result":"pass"}}]}}"#).unwrap();

        let report = load_self_test_report(&path).unwrap();
        assert!(report.all_passed());

        let missing = load_manifest(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(FallbackError::Io { .. })));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_self_test_report(&path), Err(FallbackError::Parse { .. })));
    }

    #[test]
    fn loads_fleet_view_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        fs::write(&path, r#"{"nodes":{"n1":{"id":"n1","hostname":"edge-1"}},"summary":{"total":1}}"#).unwrap();

        let view = load_fleet_view(&path).unwrap();
        assert_eq!(view.node_ids(), vec!["n1"]);
        assert_eq!(view.summary().map(|s| s.total), Some(1));

        fs::write(&path, r#"{"nodes":[1,2]}"#).unwrap();
        assert!(matches!(load_fleet_view(&path), Err(FallbackError::Parse { .. })));
    }
}
