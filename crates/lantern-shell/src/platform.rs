//! Per-target process fixups, selected once at the start of bootstrap.

use lantern_config::RenderBackend;
use tracing::debug;

const PLATFORM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::platform");

/// Switches the embedded web runtime needs to scale pages to the window.
const VIEWPORT_SWITCHES: &[&str] = &["--enable-viewport", "--enable-viewport-meta"];

/// Capabilities that differ between target operating systems.
pub trait Platform: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Forces the C numeric locale. Toolkits reset the locale on start, which
    /// breaks float parsing and formatting in some regions.
    fn restore_numeric_locale(&self) {
        // SAFETY: the argument is a valid NUL-terminated string and the
        // returned pointer is not retained.
        let applied = unsafe { libc::setlocale(libc::LC_NUMERIC, c"C".as_ptr()) };
        if applied.is_null() {
            debug!(target: PLATFORM_TARGET, "numeric locale could not be reset");
        }
    }

    /// Switches appended to the arguments passed to dependent subsystems.
    fn runtime_switches(&self) -> &'static [&'static str] {
        VIEWPORT_SWITCHES
    }

    /// Maps the requested render backend onto one the platform supports.
    fn apply_render_backend(&self, requested: RenderBackend) -> RenderBackend {
        requested
    }
}

/// Linux and other Unix desktops.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn name(&self) -> &'static str {
        "unix"
    }
}

/// macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacPlatform;

impl Platform for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn apply_render_backend(&self, requested: RenderBackend) -> RenderBackend {
        match requested {
            RenderBackend::OpenGlEs => RenderBackend::DesktopOpenGl,
            other => other,
        }
    }
}

/// Selects the implementation for the running target.
#[must_use]
pub fn detect() -> Box<dyn Platform> {
    if cfg!(target_os = "macos") {
        Box::new(MacPlatform)
    } else {
        Box::new(UnixPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn viewport_switches_are_appended_everywhere() {
        assert_eq!(UnixPlatform.runtime_switches(), VIEWPORT_SWITCHES);
        assert_eq!(MacPlatform.runtime_switches(), VIEWPORT_SWITCHES);
    }

    #[rstest]
    #[case(RenderBackend::OpenGlEs, RenderBackend::DesktopOpenGl)]
    #[case(RenderBackend::DesktopOpenGl, RenderBackend::DesktopOpenGl)]
    #[case(RenderBackend::Software, RenderBackend::Software)]
    fn macos_has_no_gles(#[case] requested: RenderBackend, #[case] expected: RenderBackend) {
        assert_eq!(MacPlatform.apply_render_backend(requested), expected);
    }

    #[test]
    fn unix_keeps_the_requested_backend() {
        assert_eq!(
            UnixPlatform.apply_render_backend(RenderBackend::OpenGlEs),
            RenderBackend::OpenGlEs
        );
    }
}
