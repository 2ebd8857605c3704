//! Last-resort error display used when bootstrap cannot continue.
//!
//! Nothing here depends on the logging pipeline, the configuration or any
//! component, because any of those may be what failed.

use std::io::{self, BufRead, IsTerminal, Write};

/// Title shown above the failure message.
pub const FALLBACK_TITLE: &str = "A critical error occurred.";

/// Static line appended to every failure message.
pub const SUPPORT_NOTICE: &str = "Please visit the Lantern support forums for support.";

/// Exit status returned after presenting a failure.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Text displayed for `message`.
#[must_use]
pub fn compose_text(message: &str) -> String {
    format!("{message}\n{SUPPORT_NOTICE}")
}

/// Displays a single error surface and blocks until it is dismissed.
pub trait ErrorPresenter: Send {
    /// Shows `text` under `title`.
    fn show(&mut self, title: &str, text: &str);
}

/// Presents `message` and returns the fatal exit status.
pub fn present(presenter: &mut dyn ErrorPresenter, message: &str) -> i32 {
    presenter.show(FALLBACK_TITLE, &compose_text(message));
    FATAL_EXIT_CODE
}

/// Presenter writing to the original stderr.
///
/// When stdin is a terminal it waits for Enter so the message is not lost
/// when the shell was started from a launcher that closes the window.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePresenter;

impl ErrorPresenter for ConsolePresenter {
    fn show(&mut self, title: &str, text: &str) {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        {
            let mut stderr = io::stderr().lock();
            // A failing stderr leaves no other channel to report on.
            let _ = writeln!(stderr, "{title}\n\n{text}");
            if interactive {
                let _ = write!(stderr, "\nPress Enter to close.");
            }
            let _ = stderr.flush();
        }
        if interactive {
            let mut line = String::new();
            let _ = stdin.lock().read_line(&mut line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        shown: Vec<(String, String)>,
    }

    impl ErrorPresenter for Capture {
        fn show(&mut self, title: &str, text: &str) {
            self.shown.push((title.to_owned(), text.to_owned()));
        }
    }

    #[test]
    fn presents_the_message_verbatim_with_the_notice() {
        let mut capture = Capture::default();

        let code = present(&mut capture, "disk full");

        assert_eq!(code, FATAL_EXIT_CODE);
        assert_eq!(
            capture.shown,
            vec![(
                FALLBACK_TITLE.to_owned(),
                format!("disk full\n{SUPPORT_NOTICE}")
            )]
        );
    }
}
