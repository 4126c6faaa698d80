use crate::collectors::runner::CommandRunner;
use tracing::debug;

const DIRECTIVE_IF: &str = "#if ";

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Probe(&'a str),
    Comment,
    Command(&'a str),
}

// Exact prefix: `#if` alone or `#if\tprobe` fall through to Comment.
fn classify(line: &str) -> Line<'_> {
    if let Some(probe) = line.strip_prefix(DIRECTIVE_IF) {
        Line::Probe(probe)
    } else if line.starts_with('#') {
        Line::Comment
    } else {
        Line::Command(line)
    }
}

/// Expands a command list, running every `#if <probe>` locally as it is
/// reached. A probe that fails or exits non-zero closes the gate for the
/// lines that follow until the next `#if`.
pub async fn parse(text: &str, runner: &CommandRunner) -> Vec<String> {
    let mut commands = Vec::new();
    let mut enabled = true;

    for line in text.lines() {
        match classify(line) {
            Line::Probe(probe) => {
                enabled = match runner.run(probe, None).await {
                    Ok(result) => {
                        debug!(probe, exit_code = result.exit_code, "probe finished");
                        result.exit_code == 0
                    }
                    Err(err) => {
                        debug!(probe, error = %err, "probe could not run");
                        false
                    }
                };
            }
            Line::Comment => {}
            Line::Command(command) if enabled => commands.push(command.to_string()),
            Line::Command(_) => {}
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::runner::{RemoteShell, ShellTransport};
    use crate::collectors::testing::ScriptedTransport;
    use crate::config::DEFAULT_COMMANDS;
    use std::sync::Arc;

    fn shell_runner() -> CommandRunner {
        CommandRunner::new(ShellTransport::new(
            "/bin/sh",
            RemoteShell {
                program: "ssh".to_string(),
                args: vec![],
            },
        ))
    }

    fn scripted(transport: ScriptedTransport) -> (CommandRunner, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (CommandRunner::with_transport(transport.clone()), transport)
    }

    #[test]
    fn classify_requires_exact_prefix() {
        assert_eq!(classify("#if true"), Line::Probe("true"));
        assert_eq!(classify("#if "), Line::Probe(""));
        assert_eq!(classify("#if"), Line::Comment);
        assert_eq!(classify("#if\ttrue"), Line::Comment);
        assert_eq!(classify("#ifdef x"), Line::Comment);
        assert_eq!(classify(" #if true"), Line::Command(" #if true"));
        assert_eq!(classify(""), Line::Command(""));
    }

    #[tokio::test]
    async fn gates_follow_probe_exit_codes() {
        let text = "a\n#if false\nb\nc\n#if true\nd\n";
        assert_eq!(parse(text, &shell_runner()).await, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn empty_text_gives_empty_list() {
        let (runner, transport) = scripted(ScriptedTransport::new());
        assert!(parse("", &runner).await.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn one_directive_gates_a_whole_block() {
        let (runner, _) = scripted(ScriptedTransport::new().exit("probe-a", 1));
        let text = "first\n#if probe-a\none\ntwo\nthree\n# still closed\nfour\n";
        assert_eq!(parse(text, &runner).await, vec!["first"]);
    }

    #[tokio::test]
    async fn directives_never_appear_in_output() {
        let (runner, _) = scripted(
            ScriptedTransport::new()
                .exit("open", 0)
                .exit("shut", 7),
        );
        let text = "#if open\nx\n#if shut\ny\n#if open\nz";
        let commands = parse(text, &runner).await;
        assert_eq!(commands, vec!["x", "z"]);
        assert!(commands.iter().all(|c| !c.starts_with("#if")));
    }

    #[tokio::test]
    async fn lines_are_kept_unmodified_and_in_order() {
        let (runner, _) = scripted(ScriptedTransport::new());
        let text = "  ps auxfww  \nvmstat 1 10\n\tdf -h\n";
        assert_eq!(
            parse(text, &runner).await,
            vec!["  ps auxfww  ", "vmstat 1 10", "\tdf -h"]
        );
    }

    #[tokio::test]
    async fn comments_do_not_touch_the_gate() {
        let (runner, _) = scripted(ScriptedTransport::new().exit("shut", 1));
        let text = "#if shut\n# comment\n#if\n#if\ttrue\nhidden\n";
        assert!(parse(text, &runner).await.is_empty());

        let text = "# comment\n#if\nshown\n";
        assert_eq!(parse(text, &runner).await, vec!["shown"]);
    }

    #[tokio::test]
    async fn probe_spawn_failure_closes_gate() {
        let (runner, _) = scripted(
            ScriptedTransport::new()
                .exit("true", 0)
                .spawn_failure("missing-tool --version"),
        );
        let text = "#if missing-tool --version\nhidden\n#if true\nshown\n";
        assert_eq!(parse(text, &runner).await, vec!["shown"]);
    }

    #[tokio::test]
    async fn empty_probe_closes_gate() {
        let (runner, transport) = scripted(ScriptedTransport::new());
        assert!(parse("#if \nhidden\n", &runner).await.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn probes_always_run_locally() {
        let (runner, transport) = scripted(ScriptedTransport::new());
        parse("#if which apachectl\nx\n", &runner).await;
        assert_eq!(
            transport.calls(),
            vec![("which apachectl".to_string(), None)]
        );
    }

    #[tokio::test]
    async fn blank_lines_pass_through_when_open() {
        let (runner, _) = scripted(ScriptedTransport::new().exit("shut", 1));
        let text = "id\n\ndate\n#if shut\n\n";
        assert_eq!(parse(text, &runner).await, vec!["id", "", "date"]);
    }

    #[tokio::test]
    async fn crlf_line_endings_are_split() {
        let (runner, _) = scripted(ScriptedTransport::new());
        assert_eq!(parse("id\r\ndate\r\n", &runner).await, vec!["id", "date"]);
    }

    #[tokio::test]
    async fn default_config_includes_status_page_when_apachectl_found() {
        let (runner, _) = scripted(ScriptedTransport::new().exit("which apachectl", 0));
        let commands = parse(DEFAULT_COMMANDS, &runner).await;
        assert_eq!(commands.len(), 9);
        assert_eq!(
            commands.last().map(String::as_str),
            Some("links -dump http://127.0.0.1/server-status")
        );
        assert_eq!(commands[0], "id");
    }

    #[tokio::test]
    async fn default_config_skips_status_page_without_apachectl() {
        let (runner, _) = scripted(ScriptedTransport::new().exit("which apachectl", 1));
        let commands = parse(DEFAULT_COMMANDS, &runner).await;
        assert_eq!(
            commands,
            vec![
                "id",
                "date",
                "top -bn1",
                "ps auxfww",
                "vmstat 1 10",
                "iostat 1 10",
                "free -m",
                "df -h",
            ]
        );
    }
}
