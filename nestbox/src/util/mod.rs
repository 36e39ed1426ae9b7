use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Quote a word for a POSIX shell.
///
/// Words made only of safe characters are returned unchanged so generated
/// commands stay readable in logs.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | '=' | ',' | '+' | '~')
        });
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Quote and join words into one shell command line.
pub fn shell_join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_words_unchanged() {
        assert_eq!(shell_quote("nixos-container"), "nixos-container");
        assert_eq!(shell_quote("/nix/store/abc-system"), "/nix/store/abc-system");
        assert_eq!(shell_quote("StrictHostKeyChecking=no"), "StrictHostKeyChecking=no");
    }

    #[test]
    fn test_spaces_and_quotes_escaped() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_join() {
        let words = ["-o", "ProxyCommand=ssh host nc localhost 22"];
        assert_eq!(shell_join(&words), "-o 'ProxyCommand=ssh host nc localhost 22'");
    }
}
