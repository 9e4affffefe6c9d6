//! Small helpers shared by the codecs.

/// Returns early with `$error` unless `$predicate` holds.
///
/// ```ignore
/// ensure!(body_offset <= self.max_header_bytes, ParseError::too_large_header(body_offset, self.max_header_bytes));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
