// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Cooperative cancellation for long-running provider/cache/transaction
//! operations.
//!
//! Every public async operation in [`crate::provider`], [`crate::cache`]
//! and [`crate::transaction`] accepts an optional
//! [`CancellationToken`](tokio_util::sync::CancellationToken). Passing
//! `None` preserves today's uncancelable behavior; passing `Some` races
//! the operation's body against the token and reports
//! [`PersistError::Canceled`] the moment it fires, even mid-batch.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{PersistError, PersistResult};

/// Runs `fut` to completion, or short-circuits with
/// [`PersistError::Canceled`] the instant `cancel` fires.
///
/// `cancel = None` runs `fut` unraced.
pub(crate) async fn race<T, F>(cancel: Option<&CancellationToken>, fut: F) -> PersistResult<T>
where
    F: Future<Output = PersistResult<T>>
{
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(PersistError::Canceled),
                result = fut => result,
            }
        }
        None => fut.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn none_runs_uncancelled() {
        let result = race(None, async { Ok::<_, PersistError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn fired_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = race(Some(&token), async {
            std::future::pending::<PersistResult<()>>().await
        })
        .await;
        assert!(matches!(result, Err(PersistError::Canceled)));
    }

    #[tokio::test]
    async fn live_token_lets_fut_finish() {
        let token = CancellationToken::new();
        let result = race(Some(&token), async { Ok::<_, PersistError>("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }
}
