use core::fmt::Display;

use log::error;

/// Unwraps startup results, logging the failure and exiting the process instead of panicking.
pub trait MapOrExit<V> {
    fn map_or_exit<M: AsRef<str>>(self, message: M) -> V;
}

impl<V, E: Display> MapOrExit<V> for Result<V, E> {
    fn map_or_exit<M: AsRef<str>>(self, message: M) -> V {
        match self {
            Ok(v) => v,
            Err(e) => exit(message.as_ref(), &e),
        }
    }
}

fn exit(message: &str, cause: &dyn Display) -> ! {
    error!("{}: {}", message, cause);
    std::process::exit(1);
}
