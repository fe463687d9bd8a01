//! Host-side script generation.
//!
//! The other half of the framing convention: these builders wrap caller
//! commands in the scaffolding that emits the sentinel lines the frame
//! parser and completion waiter look for. The token is mandatory on both
//! builders, so cross-command marker confusion is impossible by
//! construction.

use crate::marker::{
    CompletionToken, DONE, JSON_BEGIN, JSON_END, RESULT_FAILED, RESULT_SUCCESS, STEP_ERR, STEP_OK,
};

/// Wraps one JSON-producing query between the payload sentinels.
#[derive(Debug, Clone)]
pub struct QueryScript {
    token: CompletionToken,
    command: String,
}

impl QueryScript {
    pub fn new(token: CompletionToken, command: impl Into<String>) -> Self {
        Self {
            token,
            command: command.into(),
        }
    }

    pub fn token(&self) -> &CompletionToken {
        &self.token
    }

    /// Renders the script text sent to the host.
    pub fn render(&self) -> String {
        let tok = self.token.as_str();
        format!(
            "Write-Output \"{JSON_BEGIN}_{tok}\"\n\
             {cmd}\n\
             Write-Output \"{JSON_END}_{tok}\"\n",
            cmd = self.command,
        )
    }
}

/// One named step inside a compound command.
#[derive(Debug, Clone)]
struct Step {
    name: String,
    command: String,
}

/// Multi-step mutating command with per-step and overall markers.
///
/// Each step runs inside the host's try/catch; a step failure emits its
/// error marker and fails the whole block, but the done marker is always
/// reached so the waiter can classify the result without the process
/// exiting.
#[derive(Debug, Clone)]
pub struct CompoundScript {
    token: CompletionToken,
    steps: Vec<Step>,
}

impl CompoundScript {
    pub fn new(token: CompletionToken) -> Self {
        Self {
            token,
            steps: Vec::new(),
        }
    }

    pub fn token(&self) -> &CompletionToken {
        &self.token
    }

    /// Adds a named step. Step names appear in markers and must be unique
    /// within one script.
    pub fn step(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.steps.push(Step {
            name: name.into(),
            command: command.into(),
        });
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Renders the script text sent to the host.
    pub fn render(&self) -> String {
        let tok = self.token.as_str();
        let mut out = String::new();
        out.push_str("$__lc_ok = $true\n");

        for step in &self.steps {
            let name = &step.name;
            out.push_str(&format!(
                "if ($__lc_ok) {{\n\
                 try {{\n\
                 {cmd}\n\
                 Write-Output \"{STEP_OK}_{name}_{tok}\"\n\
                 }} catch {{\n\
                 $__lc_ok = $false\n\
                 Write-Output \"{STEP_ERR}_{name}_{tok}: $($_.Exception.Message)\"\n\
                 }}\n\
                 }}\n",
                cmd = step.command,
            ));
        }

        out.push_str(&format!(
            "if ($__lc_ok) {{ Write-Output \"{RESULT_SUCCESS}_{tok}\" }} \
             else {{ Write-Output \"{RESULT_FAILED}_{tok}\" }}\n\
             Write-Output \"{DONE}_{tok}\"\n"
        ));
        out
    }
}
