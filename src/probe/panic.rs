use crate::ack::Beacon;
use crate::buffer::{SubmitOutcome, inside_queue};
use crate::domain::{ErrorParams, SYSTEM_ERROR_TYPE};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

/// Extracts the human-readable message from a panic payload.
pub fn panic_message<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    info.payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

/// Submits a panic as a system error and flushes so it leaves before the
/// thread unwinds further.
pub fn report_panic(beacon: &Beacon, info: &PanicHookInfo<'_>) -> SubmitOutcome {
    let params = info.location().map(|location| {
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => backtrace.to_string(),
            _ => String::new(),
        };
        ErrorParams::new(
            location.file(),
            i64::from(location.line()),
            i64::from(location.column()),
        )
        .with_stack(stack)
    });

    let outcome = beacon.ack_error(panic_message(info), Some(SYSTEM_ERROR_TYPE), params);
    beacon.flush();
    outcome
}

/// Chains a hook that reports every panic through `beacon` before running
/// the previously installed hook.
///
/// Panics raised inside the queue itself, including adapter sends, are not
/// reported: the queue may be mid-update on this thread.
pub fn install_panic_hook(beacon: Beacon) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !inside_queue() {
            report_panic(&beacon, info);
        }
        previous(info);
    }));
}
