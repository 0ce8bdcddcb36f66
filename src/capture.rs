//! Camera capture through an external still-image utility.
//!
//! The camera is driven by spawning the capture utility (`raspistill` by
//! default) with a fixed square resolution and preview disabled.
//! Its stdout and stderr are drained through the reactor while it runs,
//! so a chatty utility can never stall on a full pipe, and its exit is
//! polled on a reactor timer so the executor keeps running while the
//! sensor exposes.
//!
//! Capture never fails loudly: every problem is logged and reported as an
//! absent frame. The caller decides whether an absent frame is fatal.

use core::time::Duration;
use std::fs;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};

use async_io_mini::{Async, IoSafe};
use futures_lite::AsyncReadExt;
use log::{error, info, warn};

use crate::app::ports::CapturePort;
use crate::config::CaptureConfig;

/// A frame written by the capture utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Where the frame lives on disk.
    pub path: PathBuf,
    /// What the classifier is told to fetch.
    pub reference: String,
}

// ---------------------------------------------------------------------------
// Still camera (utility invocation)
// ---------------------------------------------------------------------------

/// Invokes the still-capture utility.
#[derive(Debug, Clone)]
pub struct StillCamera {
    program: String,
    width: u32,
    height: u32,
    poll_interval: Duration,
}

impl StillCamera {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            program: config.program.clone(),
            width: config.width,
            height: config.height,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    /// Arguments passed to the utility for a capture into `output`.
    pub fn args(&self, output: &Path) -> Vec<String> {
        vec![
            "-n".into(),
            "-o".into(),
            output.display().to_string(),
            "--width".into(),
            self.width.to_string(),
            "--height".into(),
            self.height.to_string(),
        ]
    }

    /// Capture one frame into `output`. Returns `true` only if the utility
    /// exited successfully and the file exists afterwards.
    pub async fn shoot(&self, output: &Path) -> bool {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Capture: cannot create {}: {}", parent.display(), e);
                return false;
            }
        }

        let run = match self.run(output).await {
            Ok(run) => run,
            Err(e) => {
                error!("{} could not be run: {}", self.program, e);
                return false;
            }
        };

        surface_output(&self.program, &run);

        if !run.status.success() {
            error!("{} triggered an error ({})", self.program, describe_status(run.status));
            return false;
        }
        if !output.exists() {
            error!("{} exited cleanly but wrote no {}", self.program, output.display());
            return false;
        }
        true
    }

    async fn run(&self, output: &Path) -> io::Result<Output> {
        let mut child = Command::new(&self.program)
            .args(self.args(output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (stdout, stderr) = match drain_output(&mut child).await {
            Ok(piped) => piped,
            Err(e) => {
                if let Err(kill) = child.kill() {
                    warn!("{} could not be killed: {}", self.program, kill);
                }
                let _ = child.wait();
                return Err(e);
            }
        };

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            async_io_mini::Timer::after(self.poll_interval).await;
        };
        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }
}

/// Read the child's stdout and stderr to the end, concurrently.
async fn drain_output(child: &mut Child) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take().ok_or_else(|| io::Error::other("stdout not piped"))?;
    let stderr = child.stderr.take().ok_or_else(|| io::Error::other("stderr not piped"))?;
    let (stdout, stderr) = futures_lite::future::zip(read_pipe(stdout), read_pipe(stderr)).await;
    Ok((stdout?, stderr?))
}

async fn read_pipe<P: AsFd + IoSafe + Read>(pipe: P) -> io::Result<Vec<u8>> {
    let mut pipe = Async::new(pipe)?;
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

/// Most bytes of each output stream copied into the log.
const SURFACED_OUTPUT_LIMIT: usize = 4096;

/// Send whatever the utility printed to the log sink.
fn surface_output(program: &str, run: &Output) {
    let stdout = String::from_utf8_lossy(&run.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        info!("{}:\n{}", program, clipped(stdout));
    }
    let stderr = String::from_utf8_lossy(&run.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        warn!("{} stderr:\n{}", program, clipped(stderr));
    }
}

fn clipped(text: &str) -> std::borrow::Cow<'_, str> {
    if text.len() <= SURFACED_OUTPUT_LIMIT {
        return text.into();
    }
    let mut end = SURFACED_OUTPUT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} more bytes)", &text[..end], text.len() - end).into()
}

// ---------------------------------------------------------------------------
// Capture device (sort loop)
// ---------------------------------------------------------------------------

/// The sort loop's camera: one well-known output file, overwritten per
/// cycle.
pub struct CaptureDevice {
    camera: StillCamera,
    output_path: PathBuf,
    reference: String,
    captures: u64,
}

impl CaptureDevice {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            camera: StillCamera::new(&config),
            output_path: PathBuf::from(config.output_path),
            reference: config.reference,
            captures: 0,
        }
    }

    /// Remove the previous cycle's frame so a failed capture can never
    /// hand out a stale image. Returns `false` if the old frame is still
    /// there.
    fn clear_stale(&self) -> bool {
        match fs::remove_file(&self.output_path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                error!(
                    "Capture: could not remove stale {}: {}",
                    self.output_path.display(),
                    e
                );
                false
            }
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Successful captures since construction.
    pub fn capture_count(&self) -> u64 {
        self.captures
    }
}

impl CapturePort for CaptureDevice {
    async fn capture(&mut self) -> Option<CapturedFrame> {
        if !self.clear_stale() || !self.camera.shoot(&self.output_path).await {
            return None;
        }
        self.captures += 1;
        Some(CapturedFrame {
            path: self.output_path.clone(),
            reference: self.reference.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Training-data capture
// ---------------------------------------------------------------------------

/// Captures numbered frames into `<root>/<category>/<n>.jpg` for building a
/// training set.
pub struct TrainingCapture {
    camera: StillCamera,
    dir: PathBuf,
    next_index: u32,
}

impl TrainingCapture {
    /// Creates the category directory if needed.
    pub fn new(config: &CaptureConfig, root: &Path, category: &str) -> io::Result<Self> {
        if category.is_empty() || category.contains(['/', '\\']) || category == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid category name '{category}'"),
            ));
        }
        let dir = root.join(category);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            camera: StillCamera::new(config),
            dir,
            next_index: 0,
        })
    }

    /// Capture the next frame. The index only advances on success, so the
    /// numbering has no gaps.
    pub async fn capture_next(&mut self) -> Option<PathBuf> {
        let path = self.dir.join(format!("{}.jpg", self.next_index));
        if !self.camera.shoot(&path).await {
            return None;
        }
        self.next_index += 1;
        Some(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames captured so far.
    pub fn captured(&self) -> u32 {
        self.next_index
    }
}

/// Exit status helper for diagnostics.
pub fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".into(),
    }
}
