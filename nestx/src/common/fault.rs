use std::any::Any;

/// Extracts a readable message from a panic payload.
///
/// `panic!` with a literal produces a `&'static str` payload and a formatted
/// `panic!` produces a `String`; anything else (e.g. `std::panic::panic_any`
/// with a custom type) is reported generically.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<crate::errors::TxError>() {
        err.to_string()
    } else {
        "panic with non-string payload".to_string()
    }
}
