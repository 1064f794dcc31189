//! Keyword classification of errors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::error::NormalizedError;

/// Error category a fix template exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    UndefinedReference,
    NullReference,
    TypeMismatch,
    MissingAwait,
    MissingModule,
    MalformedApiCall,
    NetworkFailure,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::UndefinedReference => "undefined-reference",
            ErrorClass::NullReference => "null-reference",
            ErrorClass::TypeMismatch => "type-mismatch",
            ErrorClass::MissingAwait => "missing-await",
            ErrorClass::MissingModule => "missing-module",
            ErrorClass::MalformedApiCall => "malformed-api-call",
            ErrorClass::NetworkFailure => "network-failure",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rules are tried in order, the first matching one wins
const RULES: &[(ErrorClass, &[&str])] = &[
    (
        ErrorClass::UndefinedReference,
        &["is not defined", "referenceerror", "of undefined", "undefined is not"],
    ),
    (
        ErrorClass::NullReference,
        &["of null", "null is not", "null reference", "nullpointer", "is null"],
    ),
    (
        ErrorClass::TypeMismatch,
        &["typeerror", "is not a function", "expected type", "type mismatch", "cannot convert"],
    ),
    (
        ErrorClass::MissingAwait,
        &["promise", "await", "async", "unhandled rejection"],
    ),
    (
        ErrorClass::MissingModule,
        &["cannot find module", "module not found", "failed to resolve import", "no such module"],
    ),
    (
        ErrorClass::MalformedApiCall,
        &["bad request", "status 400", "status code 400", "422", "invalid request", "malformed"],
    ),
    (
        ErrorClass::NetworkFailure,
        &[
            "failed to fetch",
            "networkerror",
            "econnrefused",
            "timeout",
            "timed out",
            "network request failed",
            "cors",
        ],
    ),
];

/// Classify by message and stack
pub fn classify(error: &NormalizedError) -> ErrorClass {
    let mut haystack = error.message.to_lowercase();
    if let Some(stack) = &error.stack {
        haystack.push('\n');
        haystack.push_str(&stack.to_lowercase());
    }

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(class, _)| *class)
        .unwrap_or(ErrorClass::Unknown)
}
