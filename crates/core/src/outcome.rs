use serde::{Deserialize, Serialize};

use crate::validate::Issue;

/// Severity of the issue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Type of issue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Required,
    Invalid,
    BusinessRule,
    NotSupported,
    NotFound,
    Duplicate,
    Conflict,
    Exception,
    Informational,
}

/// One issue inside an OperationOutcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Validation-outcome envelope carried on error responses and by the
/// `$validate` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub resource_type: String,
    pub issue: Vec<OperationOutcomeIssue>,
}

impl OperationOutcome {
    pub fn new(issue: Vec<OperationOutcomeIssue>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue,
        }
    }

    /// Wrap a validator issue list, preserving its order.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        Self::new(issues.into_iter().map(Into::into).collect())
    }

    fn single(severity: IssueSeverity, code: IssueType, details: &str) -> Self {
        Self::new(vec![OperationOutcomeIssue {
            severity,
            code,
            details: details.to_string(),
            path: None,
        }])
    }

    pub fn not_found(details: &str) -> Self {
        Self::single(IssueSeverity::Error, IssueType::NotFound, details)
    }

    pub fn invalid(details: &str) -> Self {
        Self::single(IssueSeverity::Error, IssueType::Invalid, details)
    }

    pub fn conflict(details: &str) -> Self {
        Self::single(IssueSeverity::Error, IssueType::Conflict, details)
    }

    pub fn error(code: IssueType, details: &str) -> Self {
        Self::single(IssueSeverity::Error, code, details)
    }

    pub fn success(details: &str) -> Self {
        Self::single(
            IssueSeverity::Information,
            IssueType::Informational,
            details,
        )
    }
}
