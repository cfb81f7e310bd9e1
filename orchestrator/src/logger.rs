use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use env_logger::{Env, Target};
use log::info;
use parking_lot::Mutex;

/// The file every log record is copied to, once a run directory exists.
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Writes to stderr and to the log file, if any.
struct Tee;

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = LOG_FILE.lock().as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        match LOG_FILE.lock().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Installs the global logger, `info` unless `RUST_LOG` says otherwise.
///
/// Does nothing if a logger is already installed.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(Tee)))
        .try_init();
}

/// Copies every log record from now on to `<run_path>/log.txt`.
pub fn set_redirects(run_path: &Path) -> io::Result<()> {
    let path = run_path.join("log.txt");
    let file = File::create(&path)?;
    *LOG_FILE.lock() = Some(file);

    info!(path:? = path; "logging to file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn tee_copies_to_the_log_file() {
        let dir = std::env::temp_dir().join(format!("sysid-logger-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        set_redirects(&dir).unwrap();

        Tee.write_all(b"hello\n").unwrap();
        Tee.flush().unwrap();
        *LOG_FILE.lock() = None;

        let text = fs::read_to_string(dir.join("log.txt")).unwrap();
        assert!(text.contains("hello"));
        fs::remove_dir_all(dir).unwrap();
    }
}
