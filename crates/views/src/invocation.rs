//! Glue between the counter operations and the Lambda runtime.
use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use lambda_runtime::{Context, Diagnostic};
use snafu::prelude::*;

use crate::{CancelledSnafu, Error, Result};

/// The instant after which the runtime gives up on an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(SystemTime);

impl Deadline {
    pub fn at(instant: SystemTime) -> Self {
        Deadline(instant)
    }

    pub fn after(budget: Duration) -> Self {
        Deadline(SystemTime::now() + budget)
    }

    /// The deadline of the invocation described by `ctx`.
    pub fn from_context(ctx: &Context) -> Self {
        Deadline(UNIX_EPOCH + Duration::from_millis(ctx.deadline))
    }

    /// Time left before the deadline, or `None` if it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .duration_since(SystemTime::now())
            .ok()
            .filter(|left| !left.is_zero())
    }

    /// Runs `operation` to completion unless the deadline fires first.
    ///
    /// The future is dropped on timeout, which releases any in-flight request.
    pub async fn run<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let budget = self.remaining().context(CancelledSnafu { operation })?;
        log::trace!("running {operation} with {budget:?} left");
        match tokio::time::timeout(budget, future).await {
            Ok(result) => result,
            Err(_elapsed) => {
                log::error!("{operation} did not finish within {budget:?}");
                Err(Error::Timeout { operation, budget })
            }
        }
    }
}

impl From<Error> for Diagnostic {
    fn from(error: Error) -> Self {
        Diagnostic {
            error_type: error.kind().to_owned(),
            error_message: error.to_string(),
        }
    }
}
