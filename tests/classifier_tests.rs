use dbkeeper::classifier::{DATABASE_FATAL_MESSAGE, UNKNOWN_FATAL_MESSAGE};
use dbkeeper::{DriverError, ErrorClassifier, ErrorOrigin, LifecycleError, LifecycleState};

fn connect_error(kind: &str) -> LifecycleError {
    LifecycleError::Connect {
        origin: ErrorOrigin::Unknown,
        source: DriverError::new(kind, "boom"),
    }
}

#[test]
fn test_driver_scenarios() {
    let classifier = ErrorClassifier::new("Mongo");

    assert_eq!(
        classifier.classify(&connect_error("Mongo.NetworkError")),
        ErrorOrigin::Database
    );
    assert_eq!(
        classifier.classify(&connect_error("MongoServerSelectionError")),
        ErrorOrigin::Database
    );
    assert_eq!(
        classifier.classify(&connect_error("TypeError")),
        ErrorOrigin::Unknown
    );
}

#[test]
fn test_classification_is_idempotent() {
    let classifier = ErrorClassifier::new("Mongo");
    for kind in ["MongoError", "TypeError", "", "Mongo", "mongo"] {
        let err = connect_error(kind);
        let first = classifier.classify(&err);
        for _ in 0..5 {
            assert_eq!(classifier.classify(&err), first, "kind {kind:?}");
        }
        assert_eq!(classifier.classify_kind(kind), first);
    }
}

#[test]
fn test_prefix_is_configurable() {
    let err = connect_error("PgsqlDbError");
    assert_eq!(ErrorClassifier::new("Mongo").classify(&err), ErrorOrigin::Unknown);
    assert_eq!(ErrorClassifier::new("Pgsql").classify(&err), ErrorOrigin::Database);
    assert_eq!(ErrorClassifier::new("Pgsql").prefix(), "Pgsql");
}

#[test]
fn test_errors_without_driver_kind_are_unknown() {
    let classifier = ErrorClassifier::new("Mongo");
    let invalid = LifecycleError::InvalidState {
        operation: "disconnect",
        state: LifecycleState::Connecting,
    };
    assert_eq!(classifier.classify(&invalid), ErrorOrigin::Unknown);

    let action = LifecycleError::Action {
        index: 2,
        origin: ErrorOrigin::Unknown,
        source: anyhow::anyhow!("undefined is not a function"),
    };
    assert_eq!(classifier.classify(&action), ErrorOrigin::Unknown);
}

#[test]
fn test_action_wrapping_driver_error_is_database_origin() {
    let classifier = ErrorClassifier::new("Mongo");
    let action = LifecycleError::Action {
        index: 0,
        origin: ErrorOrigin::Unknown,
        source: DriverError::new("MongoServerError", "duplicate key").into(),
    };
    assert_eq!(classifier.classify(&action), ErrorOrigin::Database);
}

#[test]
fn test_fatal_message_per_origin() {
    assert_eq!(ErrorOrigin::Database.fatal_message(), DATABASE_FATAL_MESSAGE);
    assert_eq!(ErrorOrigin::Unknown.fatal_message(), UNKNOWN_FATAL_MESSAGE);
    assert!(UNKNOWN_FATAL_MESSAGE.contains("on-connect action"));
}
