//! Render backend preference read before the graphics runtime starts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Graphics backend requested for the compositing engine.
///
/// The setting historically was a boolean ("use desktop OpenGL"), so numeric
/// and boolean spellings are accepted alongside the named forms.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    /// Native desktop OpenGL driver.
    DesktopOpenGl,
    /// OpenGL ES, translated where the platform requires it.
    #[default]
    OpenGlEs,
    /// CPU rasteriser.
    Software,
}

impl fmt::Display for RenderBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DesktopOpenGl => "opengl",
            Self::OpenGlEs => "gles",
            Self::Software => "software",
        };
        formatter.write_str(label)
    }
}

/// Error returned when a render backend preference cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported render backend: {0}")]
pub struct RenderBackendParseError(String);

impl FromStr for RenderBackend {
    type Err = RenderBackendParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "opengl" | "desktop" | "true" | "1" => Ok(Self::DesktopOpenGl),
            "gles" | "opengles" | "angle" | "false" | "0" => Ok(Self::OpenGlEs),
            "software" => Ok(Self::Software),
            other => Err(RenderBackendParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", RenderBackend::DesktopOpenGl)]
    #[case("true", RenderBackend::DesktopOpenGl)]
    #[case("0", RenderBackend::OpenGlEs)]
    #[case("False", RenderBackend::OpenGlEs)]
    #[case("software", RenderBackend::Software)]
    fn accepts_boolean_and_named_forms(#[case] raw: &str, #[case] expected: RenderBackend) {
        assert_eq!(raw.parse::<RenderBackend>().ok(), Some(expected));
    }

    #[test]
    fn rejects_unknown_backends() {
        assert!("vulkan".parse::<RenderBackend>().is_err());
    }
}
