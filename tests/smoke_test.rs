//! Smoke tests for basic functionality

#[test]
fn test_version_exists() {
    // Verify the crate version string is valid semver
    let version = env!("CARGO_PKG_VERSION");
    assert!(!version.is_empty());
    let parts: Vec<&str> = version.split('.').collect();
    assert_eq!(parts.len(), 3, "Version should be semver: {version}");
}

#[test]
fn test_package_name() {
    assert_eq!(env!("CARGO_PKG_NAME"), "bsgbench");
}

#[test]
fn test_reexports_resolve() {
    let config = bsgbench::BenchConfig::default();
    assert_eq!(config.block_size, bsgbench::bsgbench_core::SECTOR_SIZE);
    assert_eq!(config.direction, bsgbench::Direction::Read);
    assert_eq!(bsgbench::bsgbench_core::SG_IO_V4_LEN, 160);
    assert!(bsgbench::bsg_bench::device::is_bsg_path("/sys/class/bsg/0:0:0:0"));
}
