use devops_companion_core::contract::Notifier;

/// Prints user-facing notices on stdout, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(notice = message, "Notice raised");
        println!("{message}");
    }
}
