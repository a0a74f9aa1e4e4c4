use smbspider::engine::{normalize_display_name, parse_host_list, split_server_path};
use smbspider::{DiscoveredPath, EntryKind, ErrorKind};

// --- display names ---

#[test]
fn test_normalize_replaces_every_underscore() {
    assert_eq!(
        normalize_display_name("some_short_string").unwrap(),
        "some short string"
    );
    assert_eq!(normalize_display_name("a__b_").unwrap(), "a  b ");
}

#[test]
fn test_normalize_rejects_empty() {
    assert_eq!(
        normalize_display_name("").unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn test_split_server_path() {
    let p = DiscoveredPath::parse("smb://srv/path/to/file1").unwrap();
    assert_eq!(
        split_server_path(&p).unwrap(),
        ("path/to/file1".to_string(), "file1".to_string())
    );
}

// --- discovered paths ---

#[test]
fn test_parse_rejects_missing_scheme_or_host() {
    assert!(DiscoveredPath::parse("srv/path").is_err());
    assert!(DiscoveredPath::parse("smb:///path").is_err());
    assert!(DiscoveredPath::parse("://srv").is_err());
}

#[test]
fn test_parse_trims_trailing_slash() {
    let p = DiscoveredPath::parse("smb://srv/share/").unwrap();
    assert_eq!(p.as_str(), "smb://srv/share");
    assert_eq!(p.join("f").as_str(), "smb://srv/share/f");
}

// --- entry kinds ---

#[test]
fn test_entry_kind_codes() {
    for code in 1..=9 {
        assert_eq!(EntryKind::from_code(code).code(), code);
    }
    assert_eq!(EntryKind::from_code(77), EntryKind::Unknown(77));
    assert!(EntryKind::Link.is_excluded());
    assert!(EntryKind::FileShare.is_container());
    assert!(!EntryKind::File.is_container());
}

// --- host list ---

#[test]
fn test_host_list_collapses_duplicates_and_blank_lines() {
    let hosts = parse_host_list("test.server\nanother.test.server\n\ntest.server\n");
    assert_eq!(hosts, vec!["test.server", "another.test.server"]);
}

#[test]
fn test_host_list_trims_and_skips_invalid() {
    let hosts = parse_host_list("  a  \r\nbad host\nb/c\nd\n");
    assert_eq!(hosts, vec!["a", "d"]);
}
