//! Subprocess-backed converter that shells out to `eml2pdf`.
//!
//! One invocation per message:
//!
//! ```text
//! eml2pdf [-d] -n 1 -p <page> [--unsafe] <input_dir> <output_dir>
//! ```
//!
//! The process runs with stdin closed, stdout and stderr captured, and a
//! hard wall-clock timeout after which it is killed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ConvertOptions, Converter, PdfDocument, StagingArea};
use crate::config::{DEFAULT_CONVERT_TIMEOUT, DEFAULT_CONVERTER_BIN, GatewayConfig};
use crate::error::ConvertError;

/// Converter that stages the message on disk and runs the external tool.
#[derive(Debug, Clone)]
pub struct Eml2PdfConverter {
    /// Program to execute.
    program: PathBuf,
    /// Arguments placed before the tool arguments (e.g. `-m eml2pdf`).
    base_args: Vec<OsString>,
    /// Wall-clock ceiling per run.
    timeout: Duration,
    /// Parent directory for staging areas (system temp dir if None).
    staging_dir: Option<PathBuf>,
}

impl Eml2PdfConverter {
    /// Create a converter running `program` with default settings.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            timeout: DEFAULT_CONVERT_TIMEOUT,
            staging_dir: None,
        }
    }

    /// Create a converter from gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut converter = Self::new(config.converter_bin.clone())
            .with_base_args(config.converter_args.iter().cloned())
            .with_timeout(config.convert_timeout);
        if let Some(dir) = &config.staging_dir {
            converter = converter.with_staging_dir(dir.clone());
        }
        converter
    }

    /// Set arguments that precede the tool arguments.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the parent directory for staging areas.
    pub fn with_staging_dir(mut self, dir: PathBuf) -> Self {
        self.staging_dir = Some(dir);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the tool once against a prepared staging area.
    async fn run(&self, staging: &StagingArea, options: &ConvertOptions) -> Result<(), ConvertError> {
        let args = build_args(options, staging.input_dir(), staging.output_dir());
        debug!(program = %self.program.display(), ?args, "Running converter");

        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let result = tokio::time::timeout(self.timeout, async {
            let (status, stdout, stderr) =
                tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    return Ok(());
                }
                // Stderr verbatim, or stdout when the tool wrote nothing there.
                let diagnostics = if stderr.is_empty() { stdout } else { stderr };
                Err(ConvertError::Failed {
                    code: status.code().unwrap_or(-1),
                    diagnostics: String::from_utf8_lossy(&diagnostics).into_owned(),
                })
            }
            Ok(Err(e)) => Err(ConvertError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(ConvertError::Timeout(self.timeout))
            }
        }
    }
}

impl Default for Eml2PdfConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERTER_BIN)
    }
}

#[async_trait]
impl Converter for Eml2PdfConverter {
    async fn convert(
        &self,
        eml: &[u8],
        options: &ConvertOptions,
    ) -> Result<PdfDocument, ConvertError> {
        let start = Instant::now();
        let staging = StagingArea::create(self.staging_dir.as_deref()).await?;
        staging.write_input(eml).await?;

        let outcome = match self.run(&staging, options).await {
            Ok(()) => staging.read_first_pdf().await.map_err(ConvertError::from),
            Err(e) => Err(e),
        };
        staging.close();

        match outcome {
            Ok(Some(doc)) => {
                info!(
                    filename = %doc.filename,
                    pdf_bytes = doc.bytes.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Converter produced PDF"
                );
                Ok(doc)
            }
            Ok(None) => {
                warn!("Converter exited successfully without writing a PDF");
                Err(ConvertError::NoOutput)
            }
            Err(e) => {
                warn!(error = %e, elapsed_ms = start.elapsed().as_millis() as u64, "Conversion failed");
                Err(e)
            }
        }
    }
}

/// Tool arguments: `[-d] -n 1 -p <page> [--unsafe] <input_dir> <output_dir>`.
pub fn build_args(options: &ConvertOptions, input_dir: &Path, output_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(8);
    if options.debug_html {
        args.push("-d".into());
    }
    args.push("-n".into());
    args.push("1".into());
    args.push("-p".into());
    args.push(options.page.clone().into());
    if options.unsafe_html {
        args.push("--unsafe".into());
    }
    args.push(input_dir.into());
    args.push(output_dir.into());
    args
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_build_args_defaults() {
        let args = build_args(
            &ConvertOptions::default(),
            Path::new("/s/in"),
            Path::new("/s/out"),
        );
        assert_eq!(arg_strings(&args), vec!["-n", "1", "-p", "a4", "/s/in", "/s/out"]);
    }

    #[test]
    fn test_build_args_all_flags() {
        let options = ConvertOptions::default()
            .with_page("a4 landscape")
            .with_debug_html(true)
            .with_unsafe_html(true);
        let args = build_args(&options, Path::new("/s/in"), Path::new("/s/out"));
        assert_eq!(
            arg_strings(&args),
            vec!["-d", "-n", "1", "-p", "a4 landscape", "--unsafe", "/s/in", "/s/out"]
        );
    }

    #[test]
    fn test_from_config() {
        let config = GatewayConfig {
            converter_bin: PathBuf::from("python3"),
            converter_args: vec!["-m".to_string(), "eml2pdf".to_string()],
            convert_timeout: Duration::from_secs(5),
            staging_dir: Some(PathBuf::from("/var/tmp/gw")),
            ..GatewayConfig::default()
        };
        let converter = Eml2PdfConverter::from_config(&config);
        assert_eq!(converter.program(), Path::new("python3"));
        assert_eq!(converter.base_args, vec![OsString::from("-m"), OsString::from("eml2pdf")]);
        assert_eq!(converter.timeout(), Duration::from_secs(5));
        assert_eq!(converter.staging_dir, Some(PathBuf::from("/var/tmp/gw")));
    }

    #[cfg(unix)]
    mod process {
        use tempfile::TempDir;

        use super::*;

        /// Write a fake `eml2pdf` as a shell script run through `sh`.
        ///
        /// Inside the script `$prev`/`$last` hold the input and output dirs.
        fn fake_tool(dir: &TempDir, body: &str) -> Eml2PdfConverter {
            let script = dir.path().join("eml2pdf.sh");
            let preamble = "prev=\"\"; last=\"\"\nfor arg in \"$@\"; do prev=\"$last\"; last=\"$arg\"; done\n";
            std::fs::write(&script, format!("{preamble}{body}\n")).unwrap();
            Eml2PdfConverter::new("sh")
                .with_base_args([script])
                .with_staging_dir(dir.path().join("staging"))
        }

        fn staging_entries(dir: &TempDir) -> usize {
            std::fs::read_dir(dir.path().join("staging"))
                .map(|entries| entries.count())
                .unwrap_or(0)
        }

        #[tokio::test]
        async fn test_successful_conversion() {
            let dir = TempDir::new().unwrap();
            let args_file = dir.path().join("args.txt");
            let converter = fake_tool(
                &dir,
                &format!(
                    "printf '%s\\n' \"$@\" > '{}'\ncat \"$prev/message.eml\" > \"$last/message.pdf\"",
                    args_file.display()
                ),
            );

            let options = ConvertOptions::default().with_page("letter").with_unsafe_html(true);
            let doc = converter.convert(b"%PDF from eml", &options).await.unwrap();

            assert_eq!(doc.filename, "message.pdf");
            assert_eq!(doc.bytes, b"%PDF from eml");

            let recorded = std::fs::read_to_string(&args_file).unwrap();
            let lines: Vec<&str> = recorded.lines().collect();
            assert_eq!(&lines[..5], &["-n", "1", "-p", "letter", "--unsafe"]);
            assert!(lines[5].ends_with("/in"));
            assert!(lines[6].ends_with("/out"));
            assert_eq!(lines.len(), 7);

            assert_eq!(staging_entries(&dir), 0);
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let dir = TempDir::new().unwrap();
            let converter = fake_tool(&dir, "printf 'bad mime' >&2\nexit 2");

            let err = converter
                .convert(b"garbage", &ConvertOptions::default())
                .await
                .unwrap_err();

            match err {
                ConvertError::Failed { code, diagnostics } => {
                    assert_eq!(code, 2);
                    assert_eq!(diagnostics, "bad mime");
                }
                other => panic!("expected Failed, got {other:?}"),
            }
            assert_eq!(staging_entries(&dir), 0);
        }

        #[tokio::test]
        async fn test_nonzero_exit_falls_back_to_stdout() {
            let dir = TempDir::new().unwrap();
            let converter = fake_tool(&dir, "printf 'parse error on line 3'\nexit 1");

            let err = converter
                .convert(b"garbage", &ConvertOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                ConvertError::Failed { code: 1, ref diagnostics } if diagnostics == "parse error on line 3"
            ));
        }

        #[tokio::test]
        async fn test_large_stderr_returned_in_full() {
            let dir = TempDir::new().unwrap();
            // 100000 bytes of 'e' then a marker, all on stderr.
            let converter = fake_tool(
                &dir,
                "head -c 100000 /dev/zero | tr '\\0' 'e' >&2\nprintf 'TAIL' >&2\nexit 3",
            );

            let err = converter
                .convert(b"garbage", &ConvertOptions::default())
                .await
                .unwrap_err();

            match err {
                ConvertError::Failed { code, diagnostics } => {
                    assert_eq!(code, 3);
                    assert_eq!(diagnostics.len(), 100_004);
                    assert!(diagnostics.starts_with("eeee"));
                    assert!(diagnostics.ends_with("eTAIL"));
                    assert!(!diagnostics.contains("truncated"));
                }
                other => panic!("expected Failed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_zero_exit_without_pdf() {
            let dir = TempDir::new().unwrap();
            let converter = fake_tool(&dir, "printf '<html/>' > \"$last/message.html\"\nexit 0");

            let err = converter
                .convert(b"From: a@example.com\r\n\r\nhi", &ConvertOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::NoOutput));
            assert_eq!(staging_entries(&dir), 0);
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let dir = TempDir::new().unwrap();
            let converter = fake_tool(&dir, "exec sleep 10").with_timeout(Duration::from_millis(200));

            let start = Instant::now();
            let err = converter
                .convert(b"slow", &ConvertOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::Timeout(t) if t == Duration::from_millis(200)));
            assert!(start.elapsed() < Duration::from_secs(5));
            assert_eq!(staging_entries(&dir), 0);
        }

        #[tokio::test]
        async fn test_missing_program() {
            let dir = TempDir::new().unwrap();
            let converter = Eml2PdfConverter::new(dir.path().join("does-not-exist"))
                .with_staging_dir(dir.path().join("staging"));

            let err = converter
                .convert(b"x", &ConvertOptions::default())
                .await
                .unwrap_err();

            assert!(matches!(err, ConvertError::Spawn { .. }));
            assert_eq!(staging_entries(&dir), 0);
        }
    }
}
