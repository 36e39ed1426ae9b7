pub mod check;
pub mod create;
pub mod destroy;
pub mod exec;
pub mod list;
pub mod start;
pub mod stop;

use nestbox::Container;
use tokio::task::JoinHandle;

/// Cancel the container's in-flight operation on Ctrl-C.
///
/// Abort the returned handle once the operation is done.
pub fn cancel_on_interrupt(container: &Container) -> JoinHandle<()> {
    let token = container.cancellation_token();
    let name = container.name().to_string();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(container = %name, "Interrupted, cancelling");
            token.cancel();
        }
    })
}

/// Turn collected per-target errors into one error.
pub fn summarize(action: &str, errors: Vec<String>, success_count: usize) -> anyhow::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let error_summary = if success_count > 0 {
        format!(
            "Failed to {} {} of {} container(s)",
            action,
            errors.len(),
            errors.len() + success_count
        )
    } else {
        format!("Failed to {} all {} container(s)", action, errors.len())
    };
    anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "))
}
