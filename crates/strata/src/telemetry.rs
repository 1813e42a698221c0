// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured cache events.
//!
//! Every event is emitted under the `cache.event` message with dotted fields, so subscribers
//! can filter on `cache.name`, `cache.operation` or `cache.activity`.

use strata_tier::Error;

use crate::CacheName;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    GetCached,
    BatchGet,
}

impl CacheOperation {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::GetCached => "cache.get_cached",
            Self::BatchGet => "cache.batch_get",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Compute,
    BackfillFailed,
    TierSkipped,
    WriteFailed,
}

impl CacheActivity {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Compute => "cache.compute",
            Self::BackfillFailed => "cache.backfill_failed",
            Self::TierSkipped => "cache.tier_skipped",
            Self::WriteFailed => "cache.write_failed",
        }
    }

    /// Failures that are swallowed rather than returned are reported at `warn`.
    pub(crate) const fn is_warning(self) -> bool {
        matches!(self, Self::BackfillFailed | Self::TierSkipped | Self::WriteFailed)
    }
}

/// A single cache event, assembled field by field and then emitted.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CacheEvent<'a> {
    name: CacheName,
    operation: CacheOperation,
    activity: CacheActivity,
    tier: Option<usize>,
    key: Option<&'a str>,
    keys: Option<usize>,
}

impl<'a> CacheEvent<'a> {
    pub(crate) const fn new(name: CacheName, operation: CacheOperation, activity: CacheActivity) -> Self {
        Self {
            name,
            operation,
            activity,
            tier: None,
            key: None,
            keys: None,
        }
    }

    pub(crate) const fn tier(mut self, tier: usize) -> Self {
        self.tier = Some(tier);
        self
    }

    pub(crate) const fn key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }

    pub(crate) const fn keys(mut self, count: usize) -> Self {
        self.keys = Some(count);
        self
    }

    pub(crate) fn emit(self) {
        self.emit_with(None);
    }

    pub(crate) fn emit_error(self, error: &Error) {
        self.emit_with(Some(error));
    }

    fn emit_with(self, error: Option<&Error>) {
        let Self {
            name,
            operation,
            activity,
            tier,
            key,
            keys,
        } = self;
        let op = operation.as_str();
        let ev = activity.as_str();

        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = name,
                    cache.operation = op,
                    cache.activity = ev,
                    cache.tier = tier,
                    cache.key = key,
                    cache.keys = keys,
                    error = error.map(tracing::field::display),
                    "cache.event"
                )
            };
        }

        if activity.is_warning() {
            emit_event!(warn);
        } else {
            emit_event!(debug);
        }
    }
}
