//! Process-backed screen capture and Tesseract OCR.

use std::io::ErrorKind;
use std::process::Command;

use tracing::debug;

use crate::detector::TextBox;
use crate::error::{AegisError, AegisResult};
use crate::ports::{OcrOutput, ScreenCapture, ScreenImage, TextExtractor};

const PATH_PLACEHOLDER: &str = "{path}";

/// Runs an external screenshot command that writes a PNG to `{path}`.
pub struct CommandCapture {
    command: String,
}

impl CommandCapture {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ScreenCapture for CommandCapture {
    fn capture(&self) -> AegisResult<ScreenImage> {
        let temp = tempfile::Builder::new()
            .prefix("aegis-screen-")
            .suffix(".png")
            .tempfile()?
            .into_temp_path();
        let path = temp.to_string_lossy().to_string();

        let mut parts = self.command.split_whitespace().map(|p| p.replace(PATH_PLACEHOLDER, &path));
        let program = parts
            .next()
            .ok_or_else(|| AegisError::Capture("capture command is empty".into()))?;
        let mut args: Vec<String> = parts.collect();
        if !self.command.contains(PATH_PLACEHOLDER) {
            args.push(path);
        }

        let output = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| AegisError::Capture(format!("{program}: {e}")))?;
        if !output.status.success() {
            return Err(AegisError::Capture(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(ScreenImage::from_temp(temp))
    }
}

/// Tesseract CLI in TSV mode.
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> AegisError {
        match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                AegisError::OcrUnavailable(format!("{}: {e}", self.command))
            }
            _ => AegisError::Ocr(format!("{}: {e}", self.command)),
        }
    }
}

impl TextExtractor for TesseractOcr {
    fn probe(&self) -> AegisResult<()> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|e| AegisError::OcrUnavailable(format!("{}: {e}", self.command)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AegisError::OcrUnavailable(format!(
                "{} --version exited with {}",
                self.command, output.status
            )))
        }
    }

    fn extract(&self, image: &ScreenImage) -> AegisResult<OcrOutput> {
        let output = Command::new(&self.command)
            .arg(image.path())
            .arg("stdout")
            .arg("tsv")
            .output()
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(AegisError::Ocr(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let parsed = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(target: "aegis::screen", words = parsed.boxes.len(), "ocr pass complete");
        Ok(parsed)
    }
}

/// Parse Tesseract TSV. Word rows (level 5) become boxes; words on the same
/// (block, paragraph, line) are joined with spaces, lines with newlines.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut out = OcrOutput::default();
    let mut current_line: Option<(&str, &str, &str)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        let (Ok(x), Ok(y), Ok(width), Ok(height)) = (
            cols[6].parse::<i32>(),
            cols[7].parse::<i32>(),
            cols[8].parse::<u32>(),
            cols[9].parse::<u32>(),
        ) else {
            continue;
        };

        let line = (cols[2], cols[3], cols[4]);
        match current_line {
            Some(prev) if prev == line => out.text.push(' '),
            Some(_) => out.text.push('\n'),
            None => {}
        }
        current_line = Some(line);
        out.text.push_str(word);
        out.boxes.push(TextBox::new(word, x, y, width, height));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1920\t1080\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t300\t20\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t80\t20\t96.5\tAccount
5\t1\t1\t1\t1\t2\t95\t10\t110\t20\t95.1\tsuspended
5\t1\t1\t1\t2\t1\t10\t40\t60\t20\t91.0\tClick
5\t1\t1\t1\t2\t2\t75\t40\t50\t20\t-1\t
";

    #[test]
    fn tsv_words_become_boxes_and_lines() {
        let out = parse_tsv(SAMPLE);
        assert_eq!(out.text, "Account suspended\nClick");
        assert_eq!(out.boxes.len(), 3);
        assert_eq!(out.boxes[1], TextBox::new("suspended", 95, 10, 110, 20));
    }

    #[test]
    fn empty_tsv_yields_nothing() {
        assert_eq!(parse_tsv(""), OcrOutput::default());
    }

    #[test]
    fn missing_engine_is_unavailable() {
        let ocr = TesseractOcr::new("aegis-no-such-ocr-binary");
        assert!(ocr.probe().unwrap_err().is_unavailable());
        let img = ScreenImage::from_path("/nonexistent.png");
        assert!(ocr.extract(&img).unwrap_err().is_unavailable());
    }

    #[test]
    fn failing_capture_command_is_an_error() {
        let cap = CommandCapture::new("aegis-no-such-capture-binary {path}");
        assert!(matches!(cap.capture(), Err(AegisError::Capture(_))));
    }
}
