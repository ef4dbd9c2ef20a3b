//! Document collaborators: OCR text extraction and field parsing.
//!
//! OCR is delegated to the external `tesseract` binary. Field parsing is a
//! line-oriented label matcher over the recognised text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::domain::{KycError, Result};
use crate::imaging::load_image;

/// Returns the raw recognised text for an image.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, image: &Path) -> Result<String>;
}

/// Extracts parsed fields from OCR text. Never fails; fields that are not
/// found are simply absent.
pub trait FieldParser: Send + Sync {
    fn parse(&self, text: &str) -> BTreeMap<String, String>;
}

/// Runs `tesseract <image> stdout`.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    program: PathBuf,
    lang: Option<String>,
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            lang: None,
        }
    }
}

impl TesseractExtractor {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            lang: None,
        }
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&self, image: &Path) -> Result<String> {
        // Reject unreadable artifacts before paying for a subprocess.
        load_image(image)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(image).arg("stdout");
        if let Some(lang) = &self.lang {
            cmd.arg("-l").arg(lang);
        }
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KycError::EngineUnavailable(format!("{} not found: {e}", self.program.display()))
            } else {
                KycError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(KycError::Decode(format!(
                "tesseract failed on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*name\s*[:\-]?\s*(\S.*?)\s*$").expect("name pattern")
});
static DOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:dob|d\.o\.b\.?|date of birth|year of birth)\s*[:\-/]?\s*(\d{2}[/\-.]\d{2}[/\-.]\d{4}|\d{4})")
        .expect("dob pattern")
});
static GENDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(female|male|transgender)\b").expect("gender pattern"));
static AADHAAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\s?(\d{4})\s?(\d{4})\b").expect("aadhaar pattern"));
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*address\s*[:\-]?\s*(\S.*?)\s*$").expect("address pattern")
});

/// Matches labelled lines of an identity card: `name`, `dob`, `gender`,
/// `aadhaar_number` (12 digits, spaces removed) and `address`. The first
/// matching line wins for each field.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelFieldParser;

impl FieldParser for LabelFieldParser {
    fn parse(&self, text: &str) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            fields.entry(key.to_string()).or_insert(value);
        };

        for line in text.lines() {
            if let Some(c) = NAME_RE.captures(line) {
                put("name", c[1].to_string());
            }
            if let Some(c) = DOB_RE.captures(line) {
                put("dob", c[1].to_string());
            }
            if let Some(c) = GENDER_RE.captures(line) {
                put("gender", capitalize(&c[1]));
            }
            if let Some(c) = AADHAAR_RE.captures(line) {
                put("aadhaar_number", format!("{}{}{}", &c[1], &c[2], &c[3]));
            }
            if let Some(c) = ADDRESS_RE.captures(line) {
                put("address", c[1].to_string());
            }
        }
        fields
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Hex SHA-256 of a file's bytes.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| KycError::Decode(format!("{}: {e}", path.display())))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
