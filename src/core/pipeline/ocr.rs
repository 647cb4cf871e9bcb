//! OCR collaborators - the engine trait, the Tesseract adapter and test doubles

use crate::core::pipeline::crop::{self, CropUnits};
use crate::core::region::{DetectionType, Rectangle};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("crop {0:?} falls outside the screenshot")]
    InvalidCrop(Rectangle),
    #[error("{program} exited with {status:?}: {stderr}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// One crop to read.
#[derive(Debug, Clone)]
pub struct OcrRequest<'a> {
    pub image: &'a Path,
    pub region: Rectangle,
    pub detection_type: DetectionType,
    pub timestamp: u64,
}

/// Maps an image region to raw text. An empty string means nothing was read.
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, request: &OcrRequest<'_>) -> Result<String, OcrError>;
}

type Responder = Box<dyn Fn(&OcrRequest<'_>) -> Result<String, OcrError> + Send + Sync>;

/// Scripted OCR engine for tests.
pub struct MockOcrEngine {
    responder: Option<Responder>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new() -> Self {
        Self {
            responder: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Text per timestamp; `None` reads as empty.
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Option<String> + Send + Sync + 'static,
    {
        Self::with_responder(move |request| Ok(pattern(request.timestamp).unwrap_or_default()))
    }

    pub fn with_texts(texts: Vec<(u64, &str)>) -> Self {
        let texts: Vec<(u64, String)> = texts.into_iter().map(|(t, s)| (t, s.to_string())).collect();
        Self::with_pattern(move |timestamp| {
            texts
                .iter()
                .find(|(t, _)| *t == timestamp)
                .map(|(_, text)| text.clone())
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&OcrRequest<'_>) -> Result<String, OcrError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for MockOcrEngine {
    fn extract_text(&self, request: &OcrRequest<'_>) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.responder {
            Some(responder) => responder(request),
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external program with `stdin` piped in.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> std::io::Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> std::io::Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // feed stdin from a separate thread so a full stdout pipe cannot block us
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_vec();
            std::thread::spawn(move || pipe.write_all(&input))
        });

        let output = child.wait_with_output()?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => warn!("⚠️ SystemCommandRunner: stdin writer for {} panicked", program),
            }
        }

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

type CommandResponder = Box<dyn Fn(&str, &[String]) -> CommandOutput + Send + Sync>;

/// Records invocations and answers with a scripted output.
pub struct MockCommandRunner {
    responder: CommandResponder,
    calls: Mutex<Vec<(String, Vec<String>, usize)>>,
}

impl MockCommandRunner {
    pub fn with_output<F>(responder: F) -> Self
    where
        F: Fn(&str, &[String]) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stdout(stdout: &str) -> Self {
        let stdout = stdout.as_bytes().to_vec();
        Self::with_output(move |_, _| CommandOutput {
            status: Some(0),
            stdout: stdout.clone(),
            stderr: Vec::new(),
        })
    }

    /// `(program, args, stdin length)` per call.
    pub fn calls(&self) -> Vec<(String, Vec<String>, usize)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> std::io::Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((program.to_string(), args.to_vec(), stdin.len()));
        }
        Ok((self.responder)(program, args))
    }
}

pub const BILL_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 .'()-:#";
pub const SPEAKER_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz .'-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub binary: String,
    pub language: String,
    pub engine_mode: u8,
    /// Page segmentation for bill chyrons (uniform block of text).
    pub bill_psm: u8,
    /// Page segmentation for speaker chyrons (single line).
    pub speaker_psm: u8,
    pub bill_whitelist: String,
    pub speaker_whitelist: String,
    pub preserve_interword_spaces: bool,
    /// Upscale, grayscale and contrast-stretch speaker crops before OCR.
    pub enhance_speaker_crops: bool,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            engine_mode: 1,
            bill_psm: 6,
            speaker_psm: 7,
            bill_whitelist: BILL_WHITELIST.to_string(),
            speaker_whitelist: SPEAKER_WHITELIST.to_string(),
            preserve_interword_spaces: true,
            enhance_speaker_crops: true,
        }
    }
}

impl TesseractConfig {
    pub fn args(&self, detection_type: DetectionType) -> Vec<String> {
        let (psm, whitelist) = match detection_type {
            DetectionType::BillDetection => (self.bill_psm, &self.bill_whitelist),
            DetectionType::SpeakerDetection => (self.speaker_psm, &self.speaker_whitelist),
        };

        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            psm.to_string(),
            "--oem".to_string(),
            self.engine_mode.to_string(),
        ];
        if self.preserve_interword_spaces {
            args.push("-c".to_string());
            args.push("preserve_interword_spaces=1".to_string());
        }
        if !whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }
        args
    }
}

/// Crops the screenshot and pipes the PNG through the `tesseract` CLI.
///
/// ```ignore
/// let ocr = TesseractOcr::new(SystemCommandRunner, TesseractConfig::default());
/// let text = ocr.extract_text(&request)?;
/// ```
pub struct TesseractOcr<R: CommandRunner> {
    runner: R,
    config: TesseractConfig,
    units: CropUnits,
}

impl<R: CommandRunner> TesseractOcr<R> {
    pub fn new(runner: R, config: TesseractConfig) -> Self {
        Self {
            runner,
            config,
            units: CropUnits::default(),
        }
    }

    pub fn with_units(mut self, units: CropUnits) -> Self {
        self.units = units;
        self
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// Reads an already encoded crop.
    pub fn read_png(&self, png: &[u8], detection_type: DetectionType) -> Result<String, OcrError> {
        let args = self.config.args(detection_type);
        let output = self.runner.run(&self.config.binary, &args, png)?;
        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OcrError::CommandFailed {
                program: self.config.binary.clone(),
                status: output.status,
                stderr: if stderr.is_empty() {
                    "no output".to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl<R: CommandRunner> OcrEngine for TesseractOcr<R> {
    fn extract_text(&self, request: &OcrRequest<'_>) -> Result<String, OcrError> {
        let image = image::open(request.image)?;
        let cropped = crop::crop_region(&image, &request.region, self.units)?;

        let png = match request.detection_type {
            DetectionType::SpeakerDetection if self.config.enhance_speaker_crops => {
                crop::encode_png(&image::DynamicImage::ImageLuma8(crop::prepare_speaker_crop(&cropped)))?
            }
            _ => crop::encode_png(&cropped)?,
        };

        debug!(
            "TesseractOcr: {:?} @{}s crop {}x{} ({} bytes)",
            request.image,
            request.timestamp,
            cropped.width(),
            cropped.height(),
            png.len()
        );
        self.read_png(&png, request.detection_type)
    }
}
