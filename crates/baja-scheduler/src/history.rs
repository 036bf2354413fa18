use std::collections::HashSet;

use baja_core::platform::ArchiveVisibility;
use baja_core::types::{ChatMessage, SourceInfo, ThreadInfo};
use baja_core::{ChatPlatform, PlatformError};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Every message at or after `cutoff` in `source` and all of its threads,
/// sorted oldest first.
///
/// Only the source's own history is required to succeed. Thread listings
/// and per-thread histories that fail are logged and skipped, so a missing
/// permission on private archives still leaves public coverage. Each thread
/// is read at most once even when several listings return it.
pub async fn fetch_history(
    platform: &dyn ChatPlatform,
    source: &SourceInfo,
    cutoff: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ChatMessage>, PlatformError> {
    let mut messages = platform.history(source.id, Some(cutoff), limit).await?;

    let mut seen = HashSet::new();
    let mut threads: Vec<ThreadInfo> = Vec::new();
    let mut collect = |found: Vec<ThreadInfo>| {
        for thread in found {
            if seen.insert(thread.id) {
                threads.push(thread);
            }
        }
    };

    match platform.active_threads(source).await {
        Ok(found) => collect(found),
        Err(e) => warn!(channel_id = source.id, err = %e, "failed to list active threads"),
    }
    for visibility in [ArchiveVisibility::Public, ArchiveVisibility::Private] {
        match platform.archived_threads(source, visibility).await {
            Ok(found) => collect(found),
            Err(e) => warn!(
                channel_id = source.id,
                %visibility,
                err = %e,
                "failed to list archived threads"
            ),
        }
    }

    for thread in &threads {
        match platform.history(thread.id, Some(cutoff), limit).await {
            Ok(found) => messages.extend(found),
            Err(e) => warn!(
                channel_id = source.id,
                thread_id = thread.id,
                thread = %thread.name,
                err = %e,
                "failed to fetch thread history"
            ),
        }
    }

    // Stable, so equal timestamps keep channel-then-thread order.
    messages.sort_by_key(|m| m.created_at);
    debug!(
        channel_id = source.id,
        threads = threads.len(),
        messages = messages.len(),
        "history fetched"
    );
    Ok(messages)
}
