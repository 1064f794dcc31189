//! Fix templates per error class

use crate::fixgen::classifier::ErrorClass;
use crate::models::fix::{CodeSketch, FixKind};
use crate::models::levels::Impact;

/// Static description of a remediation
#[derive(Debug, Clone, Copy)]
pub struct FixTemplate {
    pub kind: FixKind,
    pub confidence: f64,
    pub impact: Impact,
    pub explanation: &'static str,
    pub before: &'static str,
    pub after: &'static str,
}

impl FixTemplate {
    pub fn sketch(&self) -> CodeSketch {
        CodeSketch {
            before: self.before.to_string(),
            after: self.after.to_string(),
        }
    }
}

pub fn template_for(class: ErrorClass) -> FixTemplate {
    match class {
        ErrorClass::UndefinedReference => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.8,
            impact: Impact::High,
            explanation: "Declare or import the missing binding, or guard the access with optional chaining",
            before: "const total = cart.items.length;",
            after: "const total = cart?.items?.length ?? 0;",
        },
        ErrorClass::NullReference => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.75,
            impact: Impact::High,
            explanation: "Check the value for null before dereferencing it",
            before: "return user.profile.id;",
            after: "if (!user || !user.profile) return null;\nreturn user.profile.id;",
        },
        ErrorClass::TypeMismatch => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.6,
            impact: Impact::Medium,
            explanation: "Validate the value's type before using it and convert it where needed",
            before: "items.map(render)",
            after: "(Array.isArray(items) ? items : []).map(render)",
        },
        ErrorClass::MissingAwait => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.7,
            impact: Impact::Medium,
            explanation: "Await the promise and handle its rejection",
            before: "const data = fetchData();",
            after: "const data = await fetchData().catch(handleError);",
        },
        ErrorClass::MissingModule => FixTemplate {
            kind: FixKind::DependencyUpdate,
            confidence: 0.9,
            impact: Impact::High,
            explanation: "Install the missing dependency or fix the import path",
            before: "import pad from 'left-pad';",
            after: "// add `left-pad` to dependencies\nimport pad from 'left-pad';",
        },
        ErrorClass::MalformedApiCall => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.65,
            impact: Impact::Medium,
            explanation: "Send the request body and headers the API expects",
            before: "fetch(url, { method: 'POST', body: data })",
            after: "fetch(url, {\n  method: 'POST',\n  headers: { 'Content-Type': 'application/json' },\n  body: JSON.stringify(data),\n})",
        },
        ErrorClass::NetworkFailure => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.5,
            impact: Impact::Low,
            explanation: "Retry the request and degrade gracefully when the network is unavailable",
            before: "const res = await fetch(url);",
            after: "const res = await fetchWithRetry(url, { retries: 3 }).catch(() => null);",
        },
        ErrorClass::Unknown => FixTemplate {
            kind: FixKind::CodeChange,
            confidence: 0.3,
            impact: Impact::Low,
            explanation: "Wrap the failing code in error handling and add logging to narrow the cause",
            before: "doWork();",
            after: "try {\n  doWork();\n} catch (err) {\n  console.error('doWork failed', err);\n}",
        },
    }
}
