//! Command table and the per-invocation call context.

use thiserror::Error;

use crate::error::ScpiError;
use crate::params::{FromParam, Parameters};
use crate::pattern::{Pattern, PatternError};
use crate::response::Response;
use crate::status::Status;

/// Outcome of a command handler.
pub type CommandResult = Result<(), ScpiError>;

/// A command handler operating on the user context `C`.
pub type Handler<C> = fn(&mut C, &mut Call<'_>) -> CommandResult;

/// A pattern string bound to its handler.
pub struct Command<C> {
    pub pattern: &'static str,
    pub handler: Handler<C>,
}

impl<C> Command<C> {
    /// Binds `pattern` to `handler`.
    pub const fn new(pattern: &'static str, handler: Handler<C>) -> Self {
        Self { pattern, handler }
    }
}

// Manual impls: fn pointers are Copy regardless of `C`.
impl<C> Clone for Command<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Command<C> {}

/// Errors building a command registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Patterns {first} and {second} can match the same command")]
    Ambiguous { first: String, second: String },
}

struct Binding<C> {
    pattern: Pattern,
    handler: Handler<C>,
}

/// Ordered, immutable list of command bindings.
///
/// Construction rejects pattern pairs that could both match one input,
/// so lookup order never decides between two candidates.
pub struct CommandRegistry<C> {
    bindings: Vec<Binding<C>>,
}

impl<C> CommandRegistry<C> {
    /// Compiles and validates `commands`, keeping their order.
    pub fn new(commands: impl IntoIterator<Item = Command<C>>) -> Result<Self, RegistryError> {
        let mut bindings: Vec<Binding<C>> = Vec::new();

        for command in commands {
            let pattern = Pattern::parse(command.pattern)?;
            if let Some(existing) = bindings.iter().find(|b| b.pattern.overlaps(&pattern)) {
                return Err(RegistryError::Ambiguous {
                    first: existing.pattern.to_string(),
                    second: pattern.to_string(),
                });
            }
            bindings.push(Binding {
                pattern,
                handler: command.handler,
            });
        }

        Ok(Self { bindings })
    }

    /// Finds the first binding whose pattern matches `header`.
    pub fn find(&self, header: &str) -> Option<(&Pattern, Handler<C>)> {
        self.bindings
            .iter()
            .find(|b| b.pattern.matches(header))
            .map(|b| (&b.pattern, b.handler))
    }

    /// Returns the registered patterns in lookup order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.bindings.iter().map(|b| &b.pattern)
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if no command is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// What a handler sees of the interpreter during one invocation.
///
/// Gives access to the command's parameters, the response being built
/// and the instrument status.
pub struct Call<'a> {
    params: Parameters,
    response: &'a mut Response,
    status: &'a mut Status,
}

impl<'a> Call<'a> {
    /// Creates a call context.
    pub fn new(params: Parameters, response: &'a mut Response, status: &'a mut Status) -> Self {
        Self {
            params,
            response,
            status,
        }
    }

    /// Reads the next parameter; `Ok(None)` if absent and not required.
    pub fn param<T: FromParam>(&mut self, required: bool) -> Result<Option<T>, ScpiError> {
        self.params.next(required)
    }

    /// Reads the next parameter, which must be present.
    pub fn required<T: FromParam>(&mut self) -> Result<T, ScpiError> {
        self.params
            .next(true)?
            .ok_or(ScpiError::MissingParameter)
    }

    /// Returns true if the handler left parameters unread.
    pub fn has_unread_params(&self) -> bool {
        self.params.has_remaining()
    }

    /// Emits an integer result.
    pub fn result_int(&mut self, value: i64) {
        self.response.int(value);
    }

    /// Emits a floating point result.
    pub fn result_double(&mut self, value: f64) {
        self.response.double(value);
    }

    /// Emits an unquoted character data result.
    pub fn result_mnemonic(&mut self, value: &str) {
        self.response.mnemonic(value);
    }

    /// Emits a quoted string result.
    pub fn result_text(&mut self, value: &str) {
        self.response.text(value);
    }

    /// Gives access to the instrument status.
    pub fn status(&mut self) -> &mut Status {
        self.status
    }
}
