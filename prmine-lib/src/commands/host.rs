use std::io::Write;

/// Abstract the host environment to enable testing
pub trait Host: Send + Sync {
    // where command results go (e.g., stdout)
    fn output(&mut self) -> impl Write;

    // where progress, failures and summaries go (e.g., stderr)
    fn error(&mut self) -> impl Write;

    /// Terminate the process (although in a test environment this might just record the code).
    fn exit(&mut self, code: i32);
}
