//! Streamed, cancellable runs of the external freezer.

use crate::descriptor::{parent_dir, BuildDescriptor};
use ppt_core::{Error, Result};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// What to build and where to put it.
#[derive(Debug, Clone)]
pub struct FreezeRequest {
    /// Freezer program.
    pub freezer: PathBuf,
    /// Arguments placed before the build arguments, e.g. `-m PyInstaller`.
    pub freezer_args: Vec<String>,
    pub descriptor: BuildDescriptor,
    /// Folder receiving the executable.
    pub output_dir: PathBuf,
}

impl FreezeRequest {
    pub fn new(freezer: impl Into<PathBuf>, descriptor: BuildDescriptor, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            freezer: freezer.into(),
            freezer_args: Vec::new(),
            descriptor,
            output_dir: output_dir.into(),
        }
    }

    /// Build from a whitespace-separated command line such as `python -m PyInstaller`.
    pub fn from_command_line(command: &str, descriptor: BuildDescriptor, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut words = command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidArgument("empty freezer command".to_string()))?;
        let mut request = Self::new(program, descriptor, output_dir);
        request.freezer_args = words.map(str::to_string).collect();
        Ok(request)
    }

    fn command(&self, spec: &Path, work_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.freezer);
        cmd.args(&self.freezer_args)
            .arg("--distpath")
            .arg(&self.output_dir)
            .arg("--workpath")
            .arg(work_dir.join("build"))
            .arg("--noconfirm")
            .arg("--clean")
            .arg(spec);
        cmd
    }
}

/// Stops a running freeze from another thread.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A running freeze, yielding its output one line at a time.
///
/// The sequence ends after the process exits. A non-zero exit or a
/// cancellation is reported as a final `Err` item.
pub struct FreezeRun {
    child: Child,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    script_dir: PathBuf,
    finished: bool,
    // Held so the scratch folder lives as long as the run.
    _work_dir: TempDir,
}

impl FreezeRun {
    /// Write the descriptor into a scratch folder and start the freezer.
    pub fn start(request: &FreezeRequest) -> Result<Self> {
        fs::create_dir_all(&request.output_dir)
            .map_err(|e| Error::from_io(e, &request.output_dir))?;

        let work_dir = tempfile::Builder::new()
            .prefix("freeze-")
            .tempdir()
            .map_err(|e| Error::ProcessError(format!("Failed to create work directory: {}", e)))?;
        let spec = request.descriptor.write(work_dir.path())?;
        let script_dir = parent_dir(&request.descriptor.main_script);

        let mut cmd = request.command(&spec, work_dir.path());
        cmd.current_dir(&script_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        log::info!(
            "Freezing {} with {}",
            request.descriptor.main_script.display(),
            request.freezer.display()
        );

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                Error::ProcessError(format!("freezer not found: {}", request.freezer.display()))
            }
            _ => Error::ProcessError(format!(
                "failed to run {}: {}",
                request.freezer.display(),
                e
            )),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ProcessError("Failed to capture freezer stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ProcessError("Failed to capture freezer stderr".to_string()))?;

        let (tx, rx) = mpsc::channel();
        let readers = vec![spawn_reader(stdout, tx.clone()), spawn_reader(stderr, tx)];

        Ok(Self {
            child,
            lines: rx,
            readers,
            cancelled: Arc::new(AtomicBool::new(false)),
            script_dir,
            finished: false,
            _work_dir: work_dir,
        })
    }

    pub fn canceller(&self) -> Canceller {
        Canceller(Arc::clone(&self.cancelled))
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            log::warn!("Failed to stop freezer: {}", e);
        }
        let _ = self.child.wait();
    }

    fn finish(&mut self) -> Option<Result<String>> {
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }

        let status = match self.child.wait() {
            Ok(status) => status,
            Err(e) => return Some(Err(Error::ProcessError(format!("Failed to wait for freezer: {}", e)))),
        };

        if !status.success() {
            log::warn!("Freezer exited with {}", status);
            return Some(Err(Error::ProcessError(format!("freezer exited with {}", status))));
        }

        let cache = self.script_dir.join("__pycache__");
        if cache.is_dir() {
            if let Err(e) = fs::remove_dir_all(&cache) {
                log::warn!("Failed to remove {}: {}", cache.display(), e);
            }
        }
        log::info!("Freeze finished");
        None
    }
}

impl Iterator for FreezeRun {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                self.finished = true;
                self.kill();
                return Some(Err(Error::ProcessError("freeze cancelled".to_string())));
            }

            match self.lines.recv_timeout(POLL_INTERVAL) {
                Ok(line) => return Some(Ok(line)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.finished = true;
                    return self.finish();
                }
            }
        }
    }
}

impl Drop for FreezeRun {
    fn drop(&mut self) {
        if !self.finished {
            self.kill();
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(&['\r', '\n'][..])
                        .to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read freezer output: {}", e);
                    break;
                }
            }
        }
    })
}
