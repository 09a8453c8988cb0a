use crate::models::config::SidecarConfig;
use parking_lot::Mutex;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// On-device OCR server manager
/// Handles automatic start/stop of the bundled server process
///
/// Uses a blocking HTTP client, so call it from a blocking thread.
pub struct OcrSidecar {
    config: SidecarConfig,
    base_url: String,
    client: reqwest::blocking::Client,
    process: Mutex<Option<Child>>,
}

impl OcrSidecar {
    pub fn new(config: SidecarConfig, base_url: &str) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            process: Mutex::new(None),
        })
    }

    /// Start the server unless one is already answering
    pub fn start(&self) -> Result<(), String> {
        if self.is_server_running() {
            tracing::info!(url = %self.base_url, "OCR server already running");
            return Ok(());
        }

        if !self.config.program.exists() {
            return Err(format!(
                "OCR server binary not found at: {}",
                self.config.program.display()
            ));
        }

        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args);
        if let Some(dir) = self.config.program.parent() {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| format!("Failed to start OCR server: {}", e))?;
        tracing::info!(pid = child.id(), program = %self.config.program.display(), "OCR server spawned");
        *self.process.lock() = Some(child);

        self.wait_for_ready()
    }

    /// Check if server is running by hitting health endpoint
    pub fn is_server_running(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self.client.get(&url).send() {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn wait_for_ready(&self) -> Result<(), String> {
        let deadline = Instant::now() + Duration::from_secs(self.config.startup_timeout_secs);
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            attempt += 1;
            if self.is_server_running() {
                tracing::info!(attempt, "OCR server ready");
                return Ok(());
            }

            if let Some(status) = self.exited_status() {
                return Err(format!("OCR server exited during startup: {}", status));
            }

            std::thread::sleep(POLL_INTERVAL);
        }

        Err(format!(
            "OCR server failed to start within {} seconds",
            self.config.startup_timeout_secs
        ))
    }

    fn exited_status(&self) -> Option<std::process::ExitStatus> {
        let mut process = self.process.lock();
        let status = process.as_mut()?.try_wait().ok().flatten();
        if status.is_some() {
            *process = None;
        }
        status
    }

    /// Stop the server gracefully via shutdown endpoint, fallback to kill
    pub fn stop(&self) {
        let Some(mut child) = self.process.lock().take() else {
            return;
        };

        let shutdown_url = format!("{}/shutdown", self.base_url);
        let graceful = self.client.post(&shutdown_url).send().is_ok();

        if graceful {
            let deadline = Instant::now() + Duration::from_secs(1);
            while Instant::now() < deadline {
                if let Ok(Some(_)) = child.try_wait() {
                    tracing::info!("OCR server stopped (graceful)");
                    return;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }

        match child.kill() {
            Ok(_) => {
                let _ = child.wait();
                tracing::info!("OCR server stopped (forced)");
            }
            Err(e) => tracing::warn!(error = %e, "failed to stop OCR server"),
        }
    }
}

impl Drop for OcrSidecar {
    fn drop(&mut self) {
        if let Some(mut child) = self.process.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
