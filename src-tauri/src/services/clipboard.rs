use super::platform::Clipboard;
use parking_lot::Mutex;

/// Desktop clipboard via arboard
///
/// The handle is opened on first copy and kept for the life of the process.
/// On X11 and Wayland the copied text is served from that handle, so dropping
/// it would empty the clipboard unless a clipboard manager took it over.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_plain_text(&self, label: &str, text: &str) -> Result<(), String> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| format!("Failed to initialize clipboard: {}", e))?;
            *handle = Some(clipboard);
        }

        let Some(clipboard) = handle.as_mut() else {
            return Err("Clipboard unavailable".to_string());
        };

        if let Err(e) = clipboard.set_text(text) {
            // Reopen on the next copy
            *handle = None;
            return Err(format!("Failed to copy to clipboard: {}", e));
        }

        tracing::debug!(label, chars = text.chars().count(), "copied plain text");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_opened_lazily() {
        let clipboard = SystemClipboard::new();
        assert!(clipboard.handle.lock().is_none());
    }

    // Needs a desktop session
    #[test]
    #[ignore]
    fn test_copied_text_outlives_the_call() {
        let clipboard = SystemClipboard::new();
        assert!(clipboard.set_plain_text("recognized text", "HELLO WORLD").is_ok());
        assert!(clipboard.handle.lock().is_some());

        let text = arboard::Clipboard::new().unwrap().get_text().unwrap();
        assert_eq!(text, "HELLO WORLD");
    }
}
