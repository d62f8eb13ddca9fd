use regresshion_check::error::TargetError;
use regresshion_check::targets::{collect_targets, expand_cidr_str, expand_file, expand_target};
use std::io::Write;

#[test]
fn expand_excludes_network_and_broadcast() {
    let list = expand_cidr_str("10.0.0.0/30").unwrap();
    assert_eq!(list, vec!["10.0.0.1", "10.0.0.2"]);
}

#[test]
fn malformed_cidr_is_invalid_cidr() {
    assert!(matches!(
        expand_cidr_str("10.0.0/24"),
        Err(TargetError::InvalidCidr { .. })
    ));
}

#[tokio::test]
async fn list_file_expands_cidrs_and_skips_bad_lines() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "# lab hosts").unwrap();
    writeln!(f, "192.0.2.7").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "10.0.0.0/30   # bastions").unwrap();
    writeln!(f, "10.0.0.0/99").unwrap();
    writeln!(f, "2001:db8::1").unwrap();
    f.flush().unwrap();

    let addrs = expand_file(f.path()).await.unwrap();
    assert_eq!(addrs, vec!["192.0.2.7", "10.0.0.1", "10.0.0.2", "2001:db8::1"]);
}

#[tokio::test]
async fn positional_file_path_is_read_as_list() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "198.51.100.1").unwrap();
    f.flush().unwrap();

    let path = f.path().to_string_lossy().to_string();
    assert_eq!(expand_target(&path).await.unwrap(), vec!["198.51.100.1"]);
}

#[tokio::test]
async fn missing_list_file_is_unreadable() {
    let err = expand_file("/nonexistent/targets.txt").await.unwrap_err();
    assert!(matches!(err, TargetError::FileUnreadable { .. }));
}

#[tokio::test]
async fn collect_merges_and_dedups() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "10.0.0.1").unwrap();
    writeln!(f, "10.0.0.9").unwrap();
    f.flush().unwrap();

    let positional = vec![
        "10.0.0.0/30".to_string(),
        "not a cidr/xx".to_string(),
        "10.0.0.9".to_string(),
    ];
    let addrs = collect_targets(&positional, Some(f.path())).await;
    assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.9", "10.0.0.2"]);
}

#[tokio::test]
async fn localhost_resolves() {
    let addrs = expand_target("localhost").await.unwrap();
    assert!(!addrs.is_empty());
}
