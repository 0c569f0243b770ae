//! Tesseract CLI adapter.
//!
//! Runs `tesseract stdin stdout <args>` per call with the PNG piped on
//! stdin. A spawn failure means the binary is missing (fatal for the
//! scan); a non-zero exit only fails that one call.

use super::{OcrConfig, RecognitionEngine};
use crate::error::EngineError;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Production engine backed by the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }

    /// Languages reported by `tesseract --list-langs`.
    pub fn installed_languages(&self) -> Result<Vec<String>, EngineError> {
        let output = Command::new(&self.command)
            .arg("--list-langs")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.command, e))?;

        // Older releases print the list on stderr.
        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&listing))
    }
}

impl RecognitionEngine for TesseractEngine {
    fn probe(&self, language: &str) -> Result<(), EngineError> {
        let resolved = which::which(&self.command).map_err(|e| {
            EngineError::Unavailable(format!("'{}' not found on PATH: {}", self.command, e))
        })?;
        log::info!("[ENGINE] Using {}", resolved.display());

        let installed = self.installed_languages()?;
        let missing: Vec<&str> = language
            .split('+')
            .map(str::trim)
            .filter(|l| !l.is_empty() && !installed.iter().any(|i| i == l))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Unavailable(format!(
                "language data not installed: {} (available: {})",
                missing.join(", "),
                installed.join(", ")
            )));
        }
        Ok(())
    }

    fn recognize(&self, png: &[u8], config: &OcrConfig) -> Result<String, EngineError> {
        let mut child = Command::new(&self.command)
            .arg("stdin")
            .arg("stdout")
            .args(config.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.command, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::CallFailed("no stdin for tesseract".to_string()))?;

        // Feed stdin from a scoped thread so a chatty stderr can't deadlock us.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let result = stdin.write_all(png);
                drop(stdin);
                result
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::new(ErrorKind::Other, "stdin writer panicked")));
            (output, written)
        });

        let output = match output {
            (Ok(out), Ok(())) => out,
            (Ok(out), Err(e)) if e.kind() == ErrorKind::BrokenPipe => out,
            (Ok(_), Err(e)) => return Err(EngineError::CallFailed(format!("writing image: {}", e))),
            (Err(e), _) => return Err(EngineError::CallFailed(format!("waiting for tesseract: {}", e))),
        };

        // Missing language data is caught by `probe`. Past that point a
        // non-zero exit (e.g. `--oem 0` without legacy models) fails this
        // call only.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(EngineError::CallFailed(format!(
                "tesseract exited with {}: {}",
                output.status, message
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn spawn_error(command: &str, e: std::io::Error) -> EngineError {
    if e.kind() == ErrorKind::NotFound {
        EngineError::Unavailable(format!("'{}' is not installed", command))
    } else {
        EngineError::Unavailable(format!("failed to start '{}': {}", command, e))
    }
}

/// Pull language codes out of `--list-langs` output, skipping the header.
fn parse_language_list(listing: &str) -> Vec<String> {
    let mut langs: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(' ') && !l.ends_with(':'))
        .map(str::to_string)
        .collect();
    langs.sort();
    langs.dedup();
    langs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineMode, SegmentationMode};

    #[test]
    fn parses_language_listing() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\ndeu\n";
        assert_eq!(parse_language_list(listing), vec!["deu", "eng", "osd"]);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractEngine::new("definitely-not-a-real-tesseract-binary");
        assert!(matches!(engine.probe("eng"), Err(EngineError::Unavailable(_))));

        let config = OcrConfig::new("eng", EngineMode::Neural, SegmentationMode::Auto);
        assert!(matches!(
            engine.recognize(&[0u8; 8], &config),
            Err(EngineError::Unavailable(_))
        ));
    }

    /// Stand-in binary with `eng` installed but no legacy models.
    #[cfg(unix)]
    fn neural_only_tesseract(name: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("adaptive-ocr-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tesseract");
        let script = r#"#!/bin/sh
case "$*" in
  *--list-langs*)
    echo 'List of available languages in "/usr/share/tesseract-ocr/5/tessdata/" (2):'
    echo eng
    echo osd
    exit 0 ;;
  *"--oem 0"*)
    cat > /dev/null
    echo "Error: Tesseract (legacy) engine requested, but components are not present in /usr/share/tesseract-ocr/5/tessdata/eng.traineddata!!" >&2
    echo "Failed loading language 'eng'" >&2
    exit 1 ;;
esac
cat > /dev/null
echo "Invoice 42 paid in full"
"#;
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn missing_legacy_models_fail_only_that_call() {
        let path = neural_only_tesseract("legacy");
        let engine = TesseractEngine::new(&path.to_string_lossy());
        engine.probe("eng").unwrap();

        let legacy = OcrConfig::new("eng", EngineMode::Legacy, SegmentationMode::SingleColumn);
        match engine.recognize(b"not really a png", &legacy) {
            Err(EngineError::CallFailed(msg)) => assert!(msg.contains("tessdata")),
            other => panic!("expected CallFailed, got {:?}", other),
        }

        let neural = OcrConfig::new("eng", EngineMode::Neural, SegmentationMode::SingleColumn);
        assert_eq!(engine.recognize(b"not really a png", &neural).unwrap(), "Invoice 42 paid in full");
    }

    #[cfg(unix)]
    #[test]
    fn probe_reports_missing_language() {
        let path = neural_only_tesseract("lang");
        let engine = TesseractEngine::new(&path.to_string_lossy());
        match engine.probe("eng+jpn") {
            Err(EngineError::Unavailable(msg)) => assert!(msg.contains("jpn")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
