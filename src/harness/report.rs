use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub name: String,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one suite run. A failed setup leaves `cases` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: String,
    pub setup_error: Option<String>,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            setup_error: None,
            cases: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.setup_error.is_none() && self.cases.iter().all(CaseReport::passed)
    }

    pub fn failed_cases(&self) -> usize {
        self.cases.iter().filter(|case| !case.passed()).count()
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.name == name)
    }

    pub fn log_summary(&self) {
        if let Some(err) = &self.setup_error {
            tracing::error!("[SUITE] {}: before hook failed: {}", self.suite, err);
            return;
        }
        for case in &self.cases {
            match &case.error {
                None => tracing::info!(
                    "[SUITE] ok   {} ({}ms)",
                    case.name,
                    case.elapsed.as_millis()
                ),
                Some(err) => tracing::error!(
                    "[SUITE] FAIL {} ({}ms): {}",
                    case.name,
                    case.elapsed.as_millis(),
                    err
                ),
            }
        }
        tracing::info!(
            "[SUITE] {}: {} passing, {} failing",
            self.suite,
            self.cases.len() - self.failed_cases(),
            self.failed_cases()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{CaseReport, SuiteReport};
    use std::time::Duration;

    #[test]
    fn test_setup_failure_fails_the_suite_without_cases() {
        let mut report = SuiteReport::new("suite");
        report.setup_error = Some("boom".to_string());
        assert!(!report.passed());
        assert_eq!(report.failed_cases(), 0);
    }

    #[test]
    fn test_one_failing_case_fails_the_suite() {
        let mut report = SuiteReport::new("suite");
        report.cases.push(CaseReport {
            name: "a".to_string(),
            error: None,
            elapsed: Duration::ZERO,
        });
        report.cases.push(CaseReport {
            name: "b".to_string(),
            error: Some("nope".to_string()),
            elapsed: Duration::ZERO,
        });
        assert!(!report.passed());
        assert_eq!(report.failed_cases(), 1);
        assert!(report.case("a").is_some_and(CaseReport::passed));
    }
}
