/// Messages, warnings and errors collected over one compile call.
///
/// Every stage that can keep going after a problem writes here instead of
/// returning early, so a single compile can surface more than one error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.warnings.clear();
        self.errors.clear();
    }

    pub fn write_message(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::debug!("message: {}", msg);
        self.messages.push(msg);
    }

    pub fn write_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        log::debug!("warning: {}", warning);
        self.warnings.push(warning);
    }

    pub fn write_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        log::debug!("error: {}", error);
        self.errors.push(error);
    }

    pub fn read_messages(&self) -> &[String] {
        &self.messages
    }

    pub fn read_warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn read_errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for warning in &self.warnings {
            writeln!(f, "warning: {}", warning)?;
        }
        for error in &self.errors {
            writeln!(f, "error: {}", error)?;
        }
        Ok(())
    }
}
