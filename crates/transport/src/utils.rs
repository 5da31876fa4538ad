//! Small helpers shared by the codec.

/// Returns early with `$error` when `$predicate` does not hold.
///
/// Like `assert!`, but for input coming off the wire: a violated limit is an error
/// for the caller to handle, not a panic.
///
/// ```ignore
/// ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
