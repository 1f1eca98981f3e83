//! Integration tests for the link fixer and restore

use std::fs;
use std::path::Path;
use sumi_mirror::linkfix::{restore, LinkClass, LinkFixer, ReplacementPolicy};
use tempfile::TempDir;

const PAGE: &str = r##"<!DOCTYPE html>
<html><body>
<a href="javascript:void(0)">Menu</a>
<a href="#top">Top</a>
<a href="mailto:hello@example.com">Mail</a>
<a href="tel:+15551234">Call</a>
<a href="https://other.example.net/page">Elsewhere</a>
<a href="contact.html">Contact</a>
<a href="/desktop/slots/pragmatic">Slots</a>
</body></html>
"##;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn external_fixer(root: &Path) -> LinkFixer {
    LinkFixer::new(
        root,
        ReplacementPolicy::ExternalUrl("https://example.com/".to_string()),
    )
    .unwrap()
}

#[test]
fn test_javascript_replaced_and_anchor_preserved() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.html", PAGE);
    write(dir.path(), "contact.html", "<p>contact</p>");

    let report = external_fixer(dir.path()).run().unwrap();

    let page = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(page.contains(r#"<a href="https://example.com/">Menu</a>"#));
    assert!(page.contains(r##"<a href="#top">Top</a>"##));
    assert!(page.contains(r#"<a href="https://example.com/">Slots</a>"#));

    assert_eq!(report.links_fixed, 2);
    assert_eq!(report.files_modified, 1);
    assert_eq!(report.preserved[&LinkClass::AnchorOnly], 1);
    assert_eq!(report.preserved[&LinkClass::LocalExisting], 1);
    assert_eq!(report.backups.len(), 1);
}

#[test]
fn test_preserved_classes_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.html", PAGE);
    write(dir.path(), "contact.html", "<p>contact</p>");

    external_fixer(dir.path()).run().unwrap();

    let page = fs::read_to_string(dir.path().join("index.html")).unwrap();
    for line in PAGE.lines().filter(|l| {
        l.contains("#top")
            || l.contains("mailto:")
            || l.contains("tel:")
            || l.contains("other.example.net")
            || l.contains("contact.html")
    }) {
        assert!(page.contains(line), "changed: {}", line);
    }
}

#[test]
fn test_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.html", PAGE);
    write(dir.path(), "deep/nested/page.html", PAGE);
    let originals: Vec<Vec<u8>> = ["index.html", "deep/nested/page.html"]
        .iter()
        .map(|p| fs::read(dir.path().join(p)).unwrap())
        .collect();

    external_fixer(dir.path()).run().unwrap();
    assert_ne!(fs::read(dir.path().join("index.html")).unwrap(), originals[0]);

    let report = restore(dir.path()).unwrap();
    assert_eq!(report.restored.len(), 2);

    for (relative, original) in ["index.html", "deep/nested/page.html"].iter().zip(&originals) {
        assert_eq!(&fs::read(dir.path().join(relative)).unwrap(), original);
        assert!(!dir.path().join(format!("{}.backup", relative)).exists());
    }

    // Nothing left to restore
    let again = restore(dir.path()).unwrap();
    assert!(again.backup_missing());
}

#[test]
fn test_backup_keeps_oldest_original() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.html", PAGE);
    let oldest = fs::read(dir.path().join("index.html")).unwrap();

    external_fixer(dir.path()).run().unwrap();

    // A later edit brings back a dead link; the second pass must not replace the backup
    let mut edited = fs::read_to_string(dir.path().join("index.html")).unwrap();
    edited.push_str("<a href=\"javascript:go()\">Again</a>\n");
    fs::write(dir.path().join("index.html"), &edited).unwrap();

    let second = external_fixer(dir.path()).run().unwrap();
    assert_eq!(second.links_fixed, 1);
    assert!(second.backups.is_empty());

    restore(dir.path()).unwrap();
    assert_eq!(fs::read(dir.path().join("index.html")).unwrap(), oldest);
}

#[test]
fn test_no_backup_flag() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.html", PAGE);

    let report = external_fixer(dir.path())
        .with_backups(false)
        .run()
        .unwrap();

    assert!(report.links_fixed > 0);
    assert!(!dir.path().join("index.html.backup").exists());
}

#[test]
fn test_obfuscated_script_schemes_are_fixed() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "index.html",
        r#"<a href="java&#9;script:alert(1)">A</a><a href="VBScript:msgbox(1)">B</a><a href="data:text/html,hi">C</a><a href="https://example.org/">D</a>"#,
    );

    let report = external_fixer(dir.path()).with_backups(false).run().unwrap();

    assert_eq!(report.links_fixed, 3);
    assert_eq!(report.preserved[&LinkClass::External], 1);
    let page = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(!page.contains("script:"));
    assert!(!page.contains("data:"));
    assert!(page.contains(r#"href="https://example.org/""#));
}
