//! Desktop factory contract for kiosk isolation.

use std::sync::{Arc, Mutex};

use tracing::info;
use uuid::Uuid;

use lockdown_core::Result;

/// A desktop object that can be activated as the interactive desktop.
pub trait Desktop: Send {
    /// Name of the desktop.
    fn name(&self) -> &str;

    /// Make this the interactive desktop.
    fn activate(&self) -> Result<()>;

    /// Close the desktop object.
    fn close(&self) -> Result<()>;
}

/// Factory for desktop objects.
pub trait DesktopFactory: Send {
    /// The currently active desktop.
    fn get_current(&self) -> Result<Box<dyn Desktop>>;

    /// Create a new desktop with a randomized name.
    fn create_random(&self) -> Result<Box<dyn Desktop>>;
}

/// Logging stand-in for platforms without a desktop-object primitive.
///
/// Records which desktop is active so the kiosk state machine stays
/// observable (and testable) even where the OS call is a no-op.
#[derive(Debug, Default)]
pub struct LoggingDesktopFactory {
    active: Arc<Mutex<String>>,
}

impl LoggingDesktopFactory {
    /// Create a factory whose current desktop is named `"default"`.
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new("default".to_string())),
        }
    }

    /// Name of the desktop currently recorded as active.
    pub fn active_name(&self) -> String {
        self.active.lock().unwrap().clone()
    }
}

impl DesktopFactory for LoggingDesktopFactory {
    fn get_current(&self) -> Result<Box<dyn Desktop>> {
        let name = self.active_name();
        Ok(Box::new(LoggingDesktop {
            name,
            active: Arc::clone(&self.active),
        }))
    }

    fn create_random(&self) -> Result<Box<dyn Desktop>> {
        let name = format!("lockdown-desktop-{}", Uuid::new_v4());
        info!("Creating desktop '{}'", name);
        Ok(Box::new(LoggingDesktop {
            name,
            active: Arc::clone(&self.active),
        }))
    }
}

struct LoggingDesktop {
    name: String,
    active: Arc<Mutex<String>>,
}

impl Desktop for LoggingDesktop {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self) -> Result<()> {
        info!("Activating desktop '{}'", self.name);
        *self.active.lock().unwrap() = self.name.clone();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        info!("Closing desktop '{}'", self.name);
        Ok(())
    }
}
