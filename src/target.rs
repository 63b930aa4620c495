use crate::{
    console::{Console, Status},
    error::TargetError,
    model::TargetHandle,
    platform::Desktop,
    storage::{StateDir, TARGET_FILE},
};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, BufRead},
    thread,
    time::Duration,
};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTarget {
    handle: TargetHandle,
    #[serde(default)]
    process_id: Option<u32>,
}

/// The human side of target capture.
pub trait Operator {
    fn confirm(&self, question: &str) -> bool;

    /// Asks the operator to focus the target window and waits out the countdown.
    fn await_capture(&self, countdown: Duration);
}

pub struct ConsoleOperator {
    console: Console,
}

impl ConsoleOperator {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl Operator for ConsoleOperator {
    fn confirm(&self, question: &str) -> bool {
        self.console.prompt(format!("{question} [Y/n]"));
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        !matches!(line.trim().to_ascii_lowercase().as_str(), "n" | "no")
    }

    fn await_capture(&self, countdown: Duration) {
        self.console.line(
            Status::Info,
            format!(
                "Click into the target text field; capturing in {}s",
                countdown.as_secs()
            ),
        );
        let mut remaining = countdown.as_secs();
        while remaining > 0 {
            self.console.line(Status::Info, format!("{remaining}..."));
            thread::sleep(Duration::from_secs(1));
            remaining -= 1;
        }
    }
}

/// The target application hides its window from normal enumeration, so a handle that
/// shows up in the window listing belongs to something else.
pub fn validate_target(desktop: &dyn Desktop, handle: TargetHandle) -> Result<(), TargetError> {
    if handle.is_null() {
        return Err(TargetError::NoForeground);
    }
    if desktop.enumerable_windows().contains(&handle) {
        return Err(TargetError::Invalid(handle));
    }
    Ok(())
}

pub struct TargetResolver<'a> {
    desktop: &'a dyn Desktop,
    operator: &'a dyn Operator,
    state: StateDir,
    console: Console,
    countdown: Duration,
}

impl<'a> TargetResolver<'a> {
    pub fn new(
        desktop: &'a dyn Desktop,
        operator: &'a dyn Operator,
        state: StateDir,
        console: Console,
        countdown: Duration,
    ) -> Self {
        Self {
            desktop,
            operator,
            state,
            console,
            countdown,
        }
    }

    /// Reuses the stored handle when it still checks out, otherwise captures a new one
    /// interactively. Never gives up.
    pub fn resolve(&self) -> TargetHandle {
        if let Some(handle) = self.reuse_stored() {
            return handle;
        }

        let handle = self.capture();
        let record = StoredTarget {
            handle,
            process_id: self.desktop.window_process_id(handle),
        };
        if let Err(err) = self.state.write(TARGET_FILE, &record) {
            warn!("{err:#}");
        }
        handle
    }

    fn reuse_stored(&self) -> Option<TargetHandle> {
        let stored: StoredTarget = self.state.read(TARGET_FILE)?;
        let current_pid = self.desktop.window_process_id(stored.handle);
        let same_host = current_pid.is_some() && current_pid == stored.process_id;

        let accepted = same_host
            || self
                .operator
                .confirm(&format!("Reuse the saved target window {}?", stored.handle));
        if !accepted {
            info!("Operator declined saved target {}", stored.handle);
            return None;
        }

        match validate_target(self.desktop, stored.handle) {
            Ok(()) => {
                self.console.line(
                    Status::Info,
                    format!("Reusing saved target window {}", stored.handle),
                );
                Some(stored.handle)
            }
            Err(err) => {
                self.console.line(Status::Target, format!("Saved target rejected: {err}"));
                if let Err(err) = self.state.remove(TARGET_FILE) {
                    warn!("{err:#}");
                }
                None
            }
        }
    }

    fn capture(&self) -> TargetHandle {
        loop {
            self.operator.await_capture(self.countdown);
            let sampled = self.desktop.foreground_window();
            let result = match sampled {
                Some(handle) => validate_target(self.desktop, handle).map(|()| handle),
                None => Err(TargetError::NoForeground),
            };
            match result {
                Ok(handle) => {
                    self.console
                        .line(Status::Delivered, format!("Captured target window {handle}"));
                    return handle;
                }
                Err(err) => {
                    self.console
                        .line(Status::Target, format!("{err}; focus the text field and try again"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalTrackError;
    use std::{cell::RefCell, collections::VecDeque};

    struct FakeDesktop {
        listed: Vec<TargetHandle>,
        foreground: RefCell<VecDeque<Option<TargetHandle>>>,
        pid: Option<u32>,
    }

    impl Desktop for FakeDesktop {
        fn foreground_window(&self) -> Option<TargetHandle> {
            self.foreground.borrow_mut().pop_front().flatten()
        }

        fn enumerable_windows(&self) -> Vec<TargetHandle> {
            self.listed.clone()
        }

        fn window_process_id(&self, _handle: TargetHandle) -> Option<u32> {
            self.pid
        }

        fn process_window_titles(&self, name: &str) -> Result<Vec<String>, LocalTrackError> {
            Err(LocalTrackError::NoLocalProcess(name.into()))
        }

        fn send_select_all_paste(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct FakeOperator {
        answer: bool,
        captures: RefCell<u32>,
        questions: RefCell<u32>,
    }

    impl FakeOperator {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                captures: RefCell::new(0),
                questions: RefCell::new(0),
            }
        }
    }

    impl Operator for FakeOperator {
        fn confirm(&self, _question: &str) -> bool {
            *self.questions.borrow_mut() += 1;
            self.answer
        }

        fn await_capture(&self, _countdown: Duration) {
            *self.captures.borrow_mut() += 1;
        }
    }

    fn desktop(foreground: Vec<Option<isize>>, pid: Option<u32>) -> FakeDesktop {
        FakeDesktop {
            listed: vec![TargetHandle(10), TargetHandle(11)],
            foreground: RefCell::new(foreground.into_iter().map(|h| h.map(TargetHandle)).collect()),
            pid,
        }
    }

    #[test]
    fn enumerable_and_null_handles_are_invalid() {
        let desktop = desktop(vec![], None);
        assert!(matches!(
            validate_target(&desktop, TargetHandle(10)),
            Err(TargetError::Invalid(_))
        ));
        assert!(validate_target(&desktop, TargetHandle(0)).is_err());
        assert!(validate_target(&desktop, TargetHandle(99)).is_ok());
    }

    #[test]
    fn capture_retries_until_a_hidden_window_is_focused() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::open(dir.path()).unwrap();
        let desktop = desktop(vec![Some(10), None, Some(77)], Some(4242));
        let operator = FakeOperator::new(true);
        let resolver =
            TargetResolver::new(&desktop, &operator, state.clone(), Console::silent(), Duration::ZERO);

        assert_eq!(resolver.resolve(), TargetHandle(77));
        assert_eq!(*operator.captures.borrow(), 3);
        assert_eq!(
            state.read::<StoredTarget>(TARGET_FILE),
            Some(StoredTarget {
                handle: TargetHandle(77),
                process_id: Some(4242)
            })
        );
    }

    #[test]
    fn stored_handle_with_same_host_is_reused_without_asking() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::open(dir.path()).unwrap();
        state
            .write(
                TARGET_FILE,
                &StoredTarget {
                    handle: TargetHandle(77),
                    process_id: Some(4242),
                },
            )
            .unwrap();
        let desktop = desktop(vec![], Some(4242));
        let operator = FakeOperator::new(false);
        let resolver =
            TargetResolver::new(&desktop, &operator, state, Console::silent(), Duration::ZERO);

        assert_eq!(resolver.resolve(), TargetHandle(77));
        assert_eq!(*operator.questions.borrow(), 0);
        assert_eq!(*operator.captures.borrow(), 0);
    }

    #[test]
    fn restarted_host_requires_confirmation_and_revalidation() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::open(dir.path()).unwrap();
        state
            .write(
                TARGET_FILE,
                &StoredTarget {
                    handle: TargetHandle(11),
                    process_id: Some(1),
                },
            )
            .unwrap();
        let desktop = desktop(vec![Some(55)], Some(2));
        let operator = FakeOperator::new(true);
        let resolver =
            TargetResolver::new(&desktop, &operator, state, Console::silent(), Duration::ZERO);

        // Confirmed, but handle 11 is enumerable, so a fresh capture happens.
        assert_eq!(resolver.resolve(), TargetHandle(55));
        assert_eq!(*operator.questions.borrow(), 1);
        assert_eq!(*operator.captures.borrow(), 1);
    }
}
