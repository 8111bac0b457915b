//! Ordered, one-shot isolation of the current process.
//!
//! ```text
//! Unisolated --isolate_filesystem--> FilesystemIsolated --isolate_process--> ProcessIsolated
//! ```
//!
//! Each state is its own type and every transition consumes the previous
//! one, so the root change always precedes the namespace unshare and
//! neither can run twice. The OS calls live behind [`Isolator`], which
//! tests replace with a recording double.

use std::fmt;
use std::path::Path;

use minibox_common::error::Result;

use crate::namespace::{self, NamespaceConfig};

/// The two irreversible isolation steps.
pub trait Isolator {
    /// Makes `root` the process's filesystem root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be changed.
    fn apply_filesystem_isolation(&mut self, root: &Path) -> Result<()>;

    /// Detaches the process into fresh namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespaces cannot be created.
    fn apply_process_isolation(&mut self) -> Result<()>;
}

/// Where the process is in the isolation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationState {
    /// Nothing applied yet.
    Unisolated,
    /// Root changed; namespaces still shared with the host.
    FilesystemIsolated,
    /// Root changed and namespaces unshared. Terminal.
    ProcessIsolated,
}

impl fmt::Display for IsolationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unisolated => write!(f, "unisolated"),
            Self::FilesystemIsolated => write!(f, "filesystem-isolated"),
            Self::ProcessIsolated => write!(f, "process-isolated"),
        }
    }
}

/// Isolator backed by `chroot(2)`, `unshare(2)`, and `sethostname(2)`.
#[derive(Debug, Clone, Default)]
pub struct LinuxIsolator {
    namespaces: NamespaceConfig,
    hostname: Option<String>,
}

impl LinuxIsolator {
    /// Creates an isolator unsharing UTS, PID, and mount namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides which namespaces are created.
    #[must_use]
    pub const fn with_namespaces(mut self, namespaces: NamespaceConfig) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Sets the hostname applied inside the new UTS namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname is invalid.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Result<Self> {
        let hostname = hostname.into();
        namespace::uts::validate_hostname(&hostname)?;
        self.hostname = Some(hostname);
        Ok(self)
    }
}

impl Isolator for LinuxIsolator {
    fn apply_filesystem_isolation(&mut self, root: &Path) -> Result<()> {
        crate::filesystem::chroot::change_root(root)
    }

    fn apply_process_isolation(&mut self) -> Result<()> {
        namespace::create_namespaces(&self.namespaces)?;
        match (&self.hostname, self.namespaces.uts) {
            (Some(hostname), true) => namespace::uts::set_hostname(hostname)?,
            (Some(_), false) => tracing::warn!("hostname ignored without a UTS namespace"),
            (None, _) => {}
        }
        Ok(())
    }
}

/// Initial state: nothing isolated.
#[derive(Debug)]
pub struct Unisolated<I> {
    isolator: I,
}

impl<I: Isolator> Unisolated<I> {
    /// Starts the sequence with the given isolator.
    pub const fn new(isolator: I) -> Self {
        Self { isolator }
    }

    /// Current state.
    pub const fn state(&self) -> IsolationState {
        IsolationState::Unisolated
    }

    /// Changes the filesystem root to `root`.
    ///
    /// # Errors
    ///
    /// Returns the isolator's error; the process should then exit.
    pub fn isolate_filesystem(mut self, root: &Path) -> Result<FilesystemIsolated<I>> {
        self.isolator.apply_filesystem_isolation(root)?;
        tracing::debug!(state = %IsolationState::FilesystemIsolated, "isolation transition");
        Ok(FilesystemIsolated {
            isolator: self.isolator,
        })
    }
}

/// Root changed, namespaces not yet unshared.
#[derive(Debug)]
pub struct FilesystemIsolated<I> {
    isolator: I,
}

impl<I: Isolator> FilesystemIsolated<I> {
    /// Current state.
    pub const fn state(&self) -> IsolationState {
        IsolationState::FilesystemIsolated
    }

    /// Unshares the configured namespaces.
    ///
    /// # Errors
    ///
    /// Returns the isolator's error; the process should then exit.
    pub fn isolate_process(mut self) -> Result<ProcessIsolated<I>> {
        self.isolator.apply_process_isolation()?;
        tracing::debug!(state = %IsolationState::ProcessIsolated, "isolation transition");
        Ok(ProcessIsolated {
            isolator: self.isolator,
        })
    }
}

/// Fully isolated. The next child spawned runs inside the new namespaces.
#[derive(Debug)]
pub struct ProcessIsolated<I> {
    isolator: I,
}

impl<I> ProcessIsolated<I> {
    /// Current state.
    pub const fn state(&self) -> IsolationState {
        IsolationState::ProcessIsolated
    }

    /// Returns the isolator.
    pub fn into_inner(self) -> I {
        self.isolator
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use minibox_common::error::MiniboxError;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Filesystem(PathBuf),
        Process,
    }

    #[derive(Debug, Default)]
    struct RecordingIsolator {
        calls: Rc<RefCell<Vec<Call>>>,
        fail_filesystem: bool,
    }

    impl Isolator for RecordingIsolator {
        fn apply_filesystem_isolation(&mut self, root: &Path) -> Result<()> {
            self.calls.borrow_mut().push(Call::Filesystem(root.to_path_buf()));
            if self.fail_filesystem {
                return Err(MiniboxError::Isolation {
                    step: "chroot",
                    message: "Operation not permitted".into(),
                });
            }
            Ok(())
        }

        fn apply_process_isolation(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::Process);
            Ok(())
        }
    }

    #[test]
    fn steps_run_once_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let isolator = RecordingIsolator {
            calls: Rc::clone(&calls),
            fail_filesystem: false,
        };

        let start = Unisolated::new(isolator);
        assert_eq!(start.state(), IsolationState::Unisolated);
        let fs = start.isolate_filesystem(Path::new("/tmp/rootfs")).expect("fs");
        assert_eq!(fs.state(), IsolationState::FilesystemIsolated);
        let done = fs.isolate_process().expect("process");
        assert_eq!(done.state(), IsolationState::ProcessIsolated);

        assert_eq!(
            *calls.borrow(),
            vec![Call::Filesystem(PathBuf::from("/tmp/rootfs")), Call::Process]
        );
    }

    #[test]
    fn filesystem_failure_prevents_process_isolation() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let isolator = RecordingIsolator {
            calls: Rc::clone(&calls),
            fail_filesystem: true,
        };

        let err = Unisolated::new(isolator)
            .isolate_filesystem(Path::new("/tmp/rootfs"))
            .unwrap_err();
        assert!(err.to_string().contains("Operation not permitted"));
        assert_eq!(calls.borrow().len(), 1);
        assert!(!calls.borrow().contains(&Call::Process));
    }

    #[test]
    fn states_display_in_kebab_case() {
        assert_eq!(IsolationState::Unisolated.to_string(), "unisolated");
        assert_eq!(IsolationState::FilesystemIsolated.to_string(), "filesystem-isolated");
        assert_eq!(IsolationState::ProcessIsolated.to_string(), "process-isolated");
    }

    #[test]
    fn linux_isolator_rejects_bad_hostname_up_front() {
        assert!(LinuxIsolator::new().with_hostname("bad host").is_err());
        assert!(LinuxIsolator::new().with_hostname("box").is_ok());
    }
}
