//! Helper macros shared by the codec and connection modules.

/// Returns early with `$error` when `$predicate` does not hold.
///
/// This is `assert!` for fallible code paths: the decoder uses it for limit checks
/// where a violation is a client error, not a bug.
///
/// ```ignore
/// ensure!(headers.len() < MAX_HEADERS, ParseError::too_many_headers(MAX_HEADERS));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
