/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation failed permanently; retrying will not help.
    ///
    /// A stream-open failure with a client-error status (other than a
    /// rate limit) falls into this kind.
    Fatal,
    /// The failure is transient and the operation may be retried.
    Retriable,
    /// Any other errors.
    Other,
}
