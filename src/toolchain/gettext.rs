use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::{CatalogCompiler, TextExtractor, ToolError};

// The header line xgettext stamps with the current time
static CREATION_DATE: OnceLock<Regex> = OnceLock::new();

/// GNU `xgettext`, invoked the way the project has always built its template
#[derive(Debug, Clone)]
pub struct Xgettext {
    program: PathBuf,
}

impl Default for Xgettext {
    fn default() -> Self {
        Self::with_program("xgettext")
    }
}

impl Xgettext {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, working_dir: &Path, listing: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(working_dir)
            .args(["-s", "--force-po", "--from-code", "UTF-8", "--language", "Python", "--no-wrap"])
            .arg("-f")
            .arg(listing)
            .arg(format!("--output={}", output.display()));
        command
    }
}

impl TextExtractor for Xgettext {
    fn name(&self) -> &str {
        "xgettext"
    }

    fn extract(&self, working_dir: &Path, listing: &Path, output: &Path) -> Result<(), ToolError> {
        // The child runs inside working_dir, so pin the other paths first
        let listing = absolute(self.name(), listing)?;
        let output = absolute(self.name(), output)?;
        run(self.name(), &listing, self.command(working_dir, &listing, &output))?;
        strip_creation_date(self.name(), &output)
    }
}

/// Drop the `POT-Creation-Date` header so unchanged sources give identical bytes
fn strip_creation_date(tool: &str, template: &Path) -> Result<(), ToolError> {
    let invalid = |e: std::io::Error| ToolError::Invalid {
        tool: tool.to_string(),
        input: template.display().to_string(),
        reason: e.to_string(),
    };

    let text = match std::fs::read_to_string(template) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(invalid(e)),
    };

    let regex = CREATION_DATE
        .get_or_init(|| Regex::new(r#"(?m)^"POT-Creation-Date: [^"\n]*"\n"#).unwrap());
    if let std::borrow::Cow::Owned(stable) = regex.replace(&text, "") {
        std::fs::write(template, stable).map_err(invalid)?;
    }
    Ok(())
}

/// GNU `msgfmt`
#[derive(Debug, Clone)]
pub struct Msgfmt {
    program: PathBuf,
}

impl Default for Msgfmt {
    fn default() -> Self {
        Self::with_program("msgfmt")
    }
}

impl Msgfmt {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, catalog: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!("--output-file={}", output.display()))
            .arg(catalog);
        command
    }
}

impl CatalogCompiler for Msgfmt {
    fn name(&self) -> &str {
        "msgfmt"
    }

    fn compile(&self, catalog: &Path, output: &Path) -> Result<(), ToolError> {
        run(self.name(), catalog, self.command(catalog, output))
    }
}

fn absolute(tool: &str, path: &Path) -> Result<PathBuf, ToolError> {
    std::path::absolute(path).map_err(|e| ToolError::Invalid {
        tool: tool.to_string(),
        input: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Run a tool to completion, turning a non-zero exit into `ToolError::Failed`
fn run(tool: &str, input: &Path, mut command: Command) -> Result<(), ToolError> {
    debug!("Running {:?}", command);

    let output = command.output().map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            input: input.display().to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }

    if !stderr.is_empty() {
        warn!("{} ({}): {}", tool, input.display(), stderr);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_xgettext_arguments() {
        let command = Xgettext::default().command(
            Path::new("/repo"),
            Path::new("/repo/app.fil"),
            Path::new("/repo/lib/locale/messages.pot"),
        );

        assert_eq!(command.get_program(), "xgettext");
        assert_eq!(command.get_current_dir(), Some(Path::new("/repo")));
        assert_eq!(
            args(&command),
            vec![
                "-s",
                "--force-po",
                "--from-code",
                "UTF-8",
                "--language",
                "Python",
                "--no-wrap",
                "-f",
                "/repo/app.fil",
                "--output=/repo/lib/locale/messages.pot",
            ]
        );
    }

    #[test]
    fn test_msgfmt_arguments() {
        let command = Msgfmt::default().command(
            Path::new("lib/locale/fr/electrum.po"),
            Path::new("lib/locale/fr/LC_MESSAGES/electrum.mo"),
        );

        assert_eq!(command.get_program(), "msgfmt");
        assert_eq!(
            args(&command),
            vec![
                "--output-file=lib/locale/fr/LC_MESSAGES/electrum.mo",
                "lib/locale/fr/electrum.po",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let temp_dir = TempDir::new().unwrap();
        let compiler = Msgfmt::with_program(temp_dir.path().join("no-such-msgfmt"));

        let err = compiler
            .compile(&temp_dir.path().join("a.po"), &temp_dir.path().join("a.mo"))
            .unwrap_err();

        assert!(matches!(err, ToolError::Spawn { ref tool, .. } if tool == "msgfmt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failure() {
        let temp_dir = TempDir::new().unwrap();
        let compiler = Msgfmt::with_program("false");

        let err = compiler
            .compile(&temp_dir.path().join("de.po"), &temp_dir.path().join("de.mo"))
            .unwrap_err();

        match err {
            ToolError::Failed { tool, input, .. } => {
                assert_eq!(tool, "msgfmt");
                assert!(input.ends_with("de.po"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_exit_is_success() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = Xgettext::with_program("true");

        extractor
            .extract(
                temp_dir.path(),
                &temp_dir.path().join("app.fil"),
                &temp_dir.path().join("messages.pot"),
            )
            .unwrap();
    }

    const XGETTEXT_HEADER: &str = "# SOME DESCRIPTIVE TITLE.\n\
msgid \"\"\n\
msgstr \"\"\n\
\"Project-Id-Version: PACKAGE VERSION\\n\"\n\
\"POT-Creation-Date: 2026-10-16 09:41+0000\\n\"\n\
\"Content-Type: text/plain; charset=UTF-8\\n\"\n\
\n\
#: gui/qt/send_tab.py:12\n\
msgid \"Send\"\n\
msgstr \"\"\n";

    #[test]
    fn test_creation_date_is_stripped() {
        let temp_dir = TempDir::new().unwrap();
        let template = temp_dir.path().join("messages.pot");
        std::fs::write(&template, XGETTEXT_HEADER).unwrap();

        strip_creation_date("xgettext", &template).unwrap();

        let text = std::fs::read_to_string(&template).unwrap();
        assert!(!text.contains("POT-Creation-Date"));
        assert!(text.contains("\"Project-Id-Version: PACKAGE VERSION\\n\"\n\"Content-Type"));
        assert!(text.ends_with("msgid \"Send\"\nmsgstr \"\"\n"));
    }

    #[test]
    fn test_regenerated_headers_compare_equal() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.pot");
        let second = temp_dir.path().join("second.pot");
        std::fs::write(&first, XGETTEXT_HEADER).unwrap();
        std::fs::write(&second, XGETTEXT_HEADER.replace("09:41", "17:03")).unwrap();

        strip_creation_date("xgettext", &first).unwrap();
        strip_creation_date("xgettext", &second).unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    }

    #[test]
    fn test_missing_template_is_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        assert!(strip_creation_date("xgettext", &temp_dir.path().join("messages.pot")).is_ok());
    }
}
