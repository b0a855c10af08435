//! Response line assembly.

/// Line terminator appended to every response line.
pub const LINE_ENDING: &str = "\r\n";

/// Accumulates the response to one input line.
///
/// Values from the same command are separated by `,`, output of
/// different commands on the same line by `;`.
#[derive(Debug, Clone, Default)]
pub struct Response {
    line: String,
    command_has_output: bool,
}

impl Response {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a new command's output.
    pub fn begin_command(&mut self) {
        self.command_has_output = false;
    }

    /// Appends an integer value.
    pub fn int(&mut self, value: i64) {
        self.push(&value.to_string());
    }

    /// Appends a floating point value.
    pub fn double(&mut self, value: f64) {
        self.push(&format_double(value));
    }

    /// Appends a character data value (unquoted, e.g. `*IDN?` fields).
    pub fn mnemonic(&mut self, value: &str) {
        self.push(value);
    }

    /// Appends a quoted string value, doubling embedded quotes.
    pub fn text(&mut self, value: &str) {
        let quoted = format!("\"{}\"", value.replace('"', "\"\""));
        self.push(&quoted);
    }

    /// Returns the response accumulated so far, without terminator.
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Returns true if nothing has been written since the last take.
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Takes the terminated response line, leaving the buffer empty.
    ///
    /// Returns `None` if no command produced output.
    pub fn take_line(&mut self) -> Option<String> {
        self.command_has_output = false;
        if self.line.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.line);
        line.push_str(LINE_ENDING);
        Some(line)
    }

    fn push(&mut self, value: &str) {
        if self.command_has_output {
            self.line.push(',');
        } else if !self.line.is_empty() {
            self.line.push(';');
        }
        self.line.push_str(value);
        self.command_has_output = true;
    }
}

/// Formats a double the way SCPI clients expect.
///
/// Finite values use the shortest representation that round-trips
/// (`0.5`, `5`, `1.234`). NaN and infinities use the SCPI-99 sentinels.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "9.91E+37".to_string()
    } else if value == f64::INFINITY {
        "9.9E+37".to_string()
    } else if value == f64::NEG_INFINITY {
        "-9.9E+37".to_string()
    } else {
        format!("{value}")
    }
}
