//! Tests for `error` module

use super::error::*;

fn all_errors() -> Vec<Error> {
    vec![
        Error::DimensionMismatch {
            expected: 128,
            actual: 64,
        },
        Error::InvalidArgument("test".into()),
        Error::ObjectNotFound(7),
        Error::NotReady,
        Error::ClosedIndex,
        Error::CorruptIndex("test".into()),
        Error::ResourceExhausted("test".into()),
        Error::Io(std::io::Error::other("test")),
        Error::Internal("test".into()),
    ]
}

#[test]
fn test_error_codes_are_unique() {
    // Arrange
    let errors = all_errors();

    // Act
    let codes: Vec<&str> = errors.iter().map(Error::code).collect();

    // Assert
    let mut unique_codes = codes.clone();
    unique_codes.sort_unstable();
    unique_codes.dedup();
    assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    for code in &codes {
        assert!(code.starts_with("PRX-"), "Code {code} should start with PRX-");
    }
}

#[test]
fn test_error_display_includes_code() {
    for err in all_errors() {
        let display = format!("{err}");
        assert!(display.contains(err.code()), "{display} misses its code");
    }
}

#[test]
fn test_dimension_mismatch_display() {
    // Arrange
    let err = Error::DimensionMismatch {
        expected: 128,
        actual: 64,
    };

    // Act
    let display = format!("{err}");

    // Assert
    assert!(display.contains("128"));
    assert!(display.contains("64"));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_kinds_cover_spec_categories() {
    assert_eq!(Error::ObjectNotFound(1).kind(), ErrorKind::NotFound);
    assert_eq!(Error::NotReady.kind(), ErrorKind::NotReady);
    assert_eq!(Error::ClosedIndex.kind(), ErrorKind::ClosedIndex);
    assert_eq!(
        Error::CorruptIndex("bad magic".into()).kind(),
        ErrorKind::CorruptIndex
    );
    assert_eq!(
        Error::ResourceExhausted("ids".into()).kind(),
        ErrorKind::ResourceExhausted
    );
    assert_eq!(
        Error::InvalidArgument("x".into()).kind(),
        ErrorKind::InvalidArgument
    );
}

#[test]
fn test_recoverability() {
    assert!(Error::NotReady.is_recoverable());
    assert!(Error::DimensionMismatch {
        expected: 1,
        actual: 2
    }
    .is_recoverable());
    assert!(!Error::CorruptIndex("x".into()).is_recoverable());
    assert!(!Error::Internal("x".into()).is_recoverable());
}

#[test]
fn test_io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: Error = io.into();
    assert_eq!(err.code(), "PRX-008");
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_try_reserve_error_is_resource_exhausted() {
    let mut v: Vec<u64> = Vec::new();
    let err: Error = v.try_reserve(usize::MAX).unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
}
