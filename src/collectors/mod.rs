pub mod parser;
pub mod runner;

pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub command: String,
    pub hostname: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn host_label(&self) -> &str {
        self.hostname.as_deref().unwrap_or(LOCALHOST)
    }

    /// First whitespace-delimited token of the command, used as the record tag.
    pub fn command_token(&self) -> &str {
        command_token(&self.command)
    }
}

pub fn command_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}
