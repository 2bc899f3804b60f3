//! Proxy contract for a remote exam server.

use serde::{Deserialize, Serialize};

use lockdown_core::{Result, Settings};

/// One exam offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    /// Server-side exam identifier
    pub id: String,
    /// Human-readable exam name shown to the operator
    pub name: String,
    /// URL of the exam's start page
    pub url: String,
}

/// Proxy to the exam server for server-driven sessions.
///
/// Every call may fail with [`lockdown_core::Error::ExamServer`] carrying the
/// server's error message; the exam negotiation operation wraps each call in
/// its uniform retry protocol.
pub trait ExamServerProxy: Send {
    /// Connect and authenticate against the server.
    fn connect(&mut self) -> Result<()>;

    /// Close the server connection.
    fn disconnect(&mut self) -> Result<()>;

    /// List the exams available to this institution.
    fn available_exams(&mut self) -> Result<Vec<Exam>>;

    /// Fetch the settings resource configured for an exam.
    fn exam_settings(&mut self, exam_id: &str) -> Result<Settings>;

    /// Report the selected exam and receive the browser exam key.
    fn confirm_exam(&mut self, exam_id: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_serialization() {
        let exam = Exam {
            id: "exam-42".to_string(),
            name: "Algorithms Final".to_string(),
            url: "https://exam.example.org/42".to_string(),
        };
        let json = serde_json::to_string(&exam).unwrap();
        let back: Exam = serde_json::from_str(&json).unwrap();
        assert_eq!(back, exam);
    }
}
