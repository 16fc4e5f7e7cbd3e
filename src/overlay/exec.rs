//! Running external commands.
//!
//! Taggers never spawn processes directly. They take an [`Exec`] at
//! construction, so tests can hand them canned output instead.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

pub type Stdout = Box<dyn AsyncRead + Send + Unpin>;

/// Starts commands.
pub trait Exec: Send + Sync {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn Process>>;
}

/// A started command.
#[async_trait]
pub trait Process: Send {
    /// Hands out the standard output stream. Only the first call returns it.
    fn take_stdout(&mut self) -> Option<Stdout>;

    /// Waits for exit. A non-zero exit is an error.
    async fn wait(&mut self) -> io::Result<()>;
}

/// Spawns real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsExec;

impl Exec for OsExec {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn Process>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Box::new(OsProcess(child)))
    }
}

struct OsProcess(Child);

#[async_trait]
impl Process for OsProcess {
    fn take_stdout(&mut self) -> Option<Stdout> {
        self.0.stdout.take().map(|s| Box::new(s) as Stdout)
    }

    async fn wait(&mut self) -> io::Result<()> {
        let status = self.0.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("exited with {status}")))
        }
    }
}


#[cfg(all(test, unix))]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn os_exec_reads_stdout() {
        let mut p = OsExec.spawn("echo", &["hello"]).unwrap();
        let mut out = String::new();
        p.take_stdout()
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        p.wait().await.unwrap();
        assert_eq!(out, "hello\n");
        assert!(p.take_stdout().is_none());
    }

    #[tokio::test]
    async fn os_exec_reports_abnormal_exit() {
        let mut p = OsExec.spawn("false", &[]).unwrap();
        assert!(p.wait().await.is_err());
    }

    #[tokio::test]
    async fn os_exec_reports_missing_program() {
        assert!(OsExec.spawn("/nonexistent/scoped-test", &[]).is_err());
    }
}
