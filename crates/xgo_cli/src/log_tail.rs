//! Background follower for the shared compile log.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Copies bytes appended to a file into a writer until stopped.
///
/// Only content written after [`spawn`](Self::spawn) is copied. Stopping
/// drains whatever is already in the file before the thread exits, and
/// dropping the tail stops it.
pub struct LogTail {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LogTail {
    /// Opens `path`, creating it if absent, and starts following it.
    pub fn spawn<W: Write + Send + 'static>(path: &Path, writer: W) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("xgo-log-tail".into())
            .spawn(move || follow(file, writer, &flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops following and waits for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("compile log tail panicked");
            }
        }
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn follow<W: Write>(mut file: File, mut writer: W, stop: &AtomicBool) {
    let mut buf = [0u8; 4096];
    loop {
        match file.read(&mut buf) {
            Ok(0) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Ok(n) => {
                if writer.write_all(&buf[..n]).and_then(|_| writer.flush()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("tail compile log: {e}");
                break;
            }
        }
    }
}
