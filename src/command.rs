use std::process::Stdio;

use anyhow::Context as _;
use tokio::io::AsyncWriteExt as _;

use crate::model::ModelClient;

pub struct CommandClient {
    program: String,
    args: Vec<String>,
}

impl CommandClient {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait::async_trait]
impl ModelClient for CommandClient {
    fn describe(&self) -> String {
        format!("command:{}", self.program)
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn model command: {}", self.program))?;

        // stdout is drained while the prompt is still being written.
        let mut stdin = child.stdin.take().context("open model command stdin")?;
        let input = prompt.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            match stdin.write_all(&input).await {
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });

        let output = child
            .wait_with_output()
            .await
            .context("wait model command")?;
        if !output.status.success() {
            anyhow::bail!("model command failed: {} ({})", self.program, output.status);
        }
        writer
            .await
            .context("join model command stdin writer")?
            .context("write model command stdin")?;

        String::from_utf8(output.stdout).context("model command stdout is not valid UTF-8")
    }
}
