//! Callback-style completion for callers that do not await futures.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::db::DbResult;

/// Drive `operation` on the runtime and hand its result to `callback`.
///
/// The callback fires exactly once, with either the success value or the
/// error. Await the returned handle to know when it has fired.
pub fn with_callback<T, F, C>(operation: F, callback: C) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Future<Output = DbResult<T>> + Send + 'static,
    C: FnOnce(DbResult<T>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = operation.await;
        callback(result);
    })
}
