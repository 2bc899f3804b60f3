//! Stand-ins for collaborators that are not deployed.
//!
//! A machine without the privileged service, without a client build or
//! without a server account still runs the orchestration core; these
//! implementations make the absence explicit instead of panicking. Policy
//! decides what an unavailable collaborator means (`Mandatory` vs `Warn` vs
//! `Ignore`).

use uuid::Uuid;

use lockdown_core::{Error, Result, SessionId, Settings};

use crate::client::{ClientAuthentication, ClientProxy};
use crate::exam::{Exam, ExamServerProxy};
use crate::service::{ServiceProxy, StartSessionCommand};

/// Service proxy for machines where the privileged service is not installed.
#[derive(Debug, Default)]
pub struct UnavailableServiceProxy;

impl ServiceProxy for UnavailableServiceProxy {
    fn connect(&mut self) -> Result<()> {
        Err(Error::ServiceUnavailable(
            "no service endpoint on this machine".to_string(),
        ))
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn start_session(&mut self, _command: &StartSessionCommand) -> Result<()> {
        Err(Error::ServiceUnavailable(
            "no service endpoint on this machine".to_string(),
        ))
    }

    fn stop_session(&mut self, _session_id: SessionId) -> Result<()> {
        Err(Error::ServiceUnavailable(
            "no service endpoint on this machine".to_string(),
        ))
    }

    fn request_system_restore(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Client proxy for deployments without a client IPC transport wired up.
#[derive(Debug, Default)]
pub struct UnavailableClientProxy;

impl ClientProxy for UnavailableClientProxy {
    fn connect(&mut self, _token: Uuid) -> Result<()> {
        Err(Error::ProxyConnection(
            "no client transport configured".to_string(),
        ))
    }

    fn request_authentication(&mut self) -> Result<ClientAuthentication> {
        Err(Error::ProxyConnection(
            "no client transport configured".to_string(),
        ))
    }

    fn initiate_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Exam server proxy for installations without a server account.
#[derive(Debug, Default)]
pub struct UnavailableExamServerProxy;

impl ExamServerProxy for UnavailableExamServerProxy {
    fn connect(&mut self) -> Result<()> {
        Err(Error::ExamServer("no exam server configured".to_string()))
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn available_exams(&mut self) -> Result<Vec<Exam>> {
        Err(Error::ExamServer("no exam server configured".to_string()))
    }

    fn exam_settings(&mut self, _exam_id: &str) -> Result<Settings> {
        Err(Error::ExamServer("no exam server configured".to_string()))
    }

    fn confirm_exam(&mut self, _exam_id: &str) -> Result<String> {
        Err(Error::ExamServer("no exam server configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_service_rejects_commands() {
        let mut proxy = UnavailableServiceProxy;
        assert!(proxy.connect().is_err());
        assert!(!proxy.is_connected());
        assert!(proxy.stop_session(SessionId::new()).is_err());
        // Teardown paths stay quiet
        assert!(proxy.disconnect().is_ok());
        assert!(proxy.request_system_restore().is_ok());
    }

    #[test]
    fn test_unavailable_client_rejects_connection() {
        let mut proxy = UnavailableClientProxy;
        assert!(proxy.connect(Uuid::new_v4()).is_err());
        assert!(proxy.request_authentication().is_err());
        assert!(proxy.disconnect().is_ok());
    }

    #[test]
    fn test_unavailable_exam_server_rejects_calls() {
        let mut proxy = UnavailableExamServerProxy;
        assert!(proxy.connect().is_err());
        assert!(proxy.available_exams().is_err());
        assert!(proxy.disconnect().is_ok());
    }
}
