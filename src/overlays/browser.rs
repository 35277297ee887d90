use std::process::{Command, Stdio};

use anyhow::Context;

/// Shows a web page to the user.
pub trait Browser {
    fn open_url(&mut self, url: &str) -> anyhow::Result<()>;
}

/// Hands the link to the desktop's default browser.
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open_url(&mut self, url: &str) -> anyhow::Result<()> {
        log::info!("Opening {url}");
        Command::new("xdg-open")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch browser for {url}"))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::{Arc, Mutex};

    use super::Browser;

    /// Clones share the same log so tests can inspect it after handing one off.
    #[derive(Default, Clone)]
    pub struct RecordingBrowser {
        pub opened: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingBrowser {
        pub fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    impl Browser for RecordingBrowser {
        fn open_url(&mut self, url: &str) -> anyhow::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }
}
