//! Pre-save hooks.
//!
//! A hook runs once per `save`, before the adapter decides between insert
//! and update, and may adjust the record (derived fields, defaults) or veto
//! the save. The calling convention is declared up front by choosing a
//! [`BeforeSave`] variant.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use crate::db::{DbError, DbResult, Record};

const MISSING_FUTURE: &str = "hook must accept a callback or return a future";
const DROPPED_CALLBACK: &str = "callback hook dropped its completion handle without signalling";

/// Single-use completion handle handed to callback-style hooks.
pub struct HookDone {
    tx: oneshot::Sender<Result<(), String>>,
}

impl HookDone {
    /// Signal that the hook finished and the save may proceed.
    pub fn done(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Signal that the hook failed; the save is aborted with `message`.
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

type CallbackHook = Arc<dyn Fn(&mut Record, HookDone) + Send + Sync>;
type HookFuture = BoxFuture<'static, DbResult<()>>;
type FutureHook = Arc<dyn Fn(&mut Record) -> Option<HookFuture> + Send + Sync>;

/// Hook evaluated before every save.
#[derive(Clone)]
pub enum BeforeSave {
    /// Called with the record and a [`HookDone`]; the save waits until the
    /// handle is signalled, which may happen after the call returns.
    Callback(CallbackHook),
    /// Called with the record; returns the future the save is chained onto.
    /// Returning `None` is a contract violation and fails the save.
    Future(FutureHook),
}

impl fmt::Debug for BeforeSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeforeSave::Callback(_) => f.write_str("BeforeSave::Callback"),
            BeforeSave::Future(_) => f.write_str("BeforeSave::Future"),
        }
    }
}

impl BeforeSave {
    pub fn callback<F>(hook: F) -> Self
    where
        F: Fn(&mut Record, HookDone) + Send + Sync + 'static,
    {
        BeforeSave::Callback(Arc::new(hook))
    }

    /// Future-style hook. Edits to the record must happen before the future
    /// is returned; the future itself only decides whether the save goes on.
    pub fn future<F, Fut>(hook: F) -> Self
    where
        F: Fn(&mut Record) -> Option<Fut> + Send + Sync + 'static,
        Fut: Future<Output = DbResult<()>> + Send + 'static,
    {
        BeforeSave::Future(Arc::new(
            move |record: &mut Record| -> Option<HookFuture> {
                hook(record).map(|future| future.boxed())
            },
        ))
    }

    /// Run the hook against `record` and wait for it to complete.
    pub(crate) async fn run(&self, record: &mut Record) -> DbResult<()> {
        match self {
            BeforeSave::Callback(hook) => {
                let (tx, rx) = oneshot::channel();
                hook(record, HookDone { tx });
                match rx.await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(message)) => Err(DbError::Hook { message }),
                    Err(_) => Err(DbError::HookContract {
                        message: DROPPED_CALLBACK.to_string(),
                    }),
                }
            }
            BeforeSave::Future(hook) => match hook(record) {
                Some(future) => future.await,
                None => Err(DbError::HookContract {
                    message: MISSING_FUTURE.to_string(),
                }),
            },
        }
    }
}
