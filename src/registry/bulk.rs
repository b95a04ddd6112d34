//! Bulk registration and administrative wipe.
//!
//! Sequential remote I/O with no concurrency subtlety: `write_all` upserts
//! descriptors idempotently, `clear_all` tears the command tree down.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tracing::debug;

use super::CommandDescriptor;
use super::DescriptorCodec;
use crate::utils;
use crate::CoordinationClient;
use crate::CoordinationError;
use crate::Result;

/// Upsert every descriptor under `root`.
///
/// Ensures the root path exists, then per descriptor: create when absent,
/// otherwise write only when the stored bytes differ. Byte-equal content is
/// skipped so repeated calls cause no redundant writes and no spurious
/// watch fires on unrelated readers.
pub(crate) async fn write_all(
    client: &dyn CoordinationClient,
    codec: &dyn DescriptorCodec,
    root: &str,
    descriptors: &[CommandDescriptor],
) -> Result<()> {
    ensure_path(client, root).await?;

    for descriptor in descriptors {
        let path = utils::join(root, &descriptor.service_id);
        let encoded = codec.encode(descriptor)?;

        match client.get_data(&path, false).await {
            Ok(reply) => {
                if reply.data == encoded {
                    debug!(%path, "descriptor unchanged; write skipped");
                } else {
                    client.set_data(&path, encoded).await?;
                    debug!(%path, "descriptor updated");
                }
            }
            Err(e) if e.is_node_missing() => {
                client.create(&path, encoded, true).await?;
                debug!(%path, "descriptor created");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Delete every descendant of `root`, innermost first, then sweep the now
/// empty path segments upward until a non-empty ancestor stops the walk.
pub(crate) async fn clear_all(client: &dyn CoordinationClient, root: &str) -> Result<()> {
    delete_recursive(client, root).await?;

    for path in utils::ancestors(root).into_iter().rev().skip(1) {
        match client.delete(&path).await {
            Ok(()) => debug!(%path, "removed empty path segment"),
            Err(e) if e.is_node_missing() => continue,
            Err(CoordinationError::NotEmpty { .. }) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Create any missing segments of `path`, shortest first.
async fn ensure_path(client: &dyn CoordinationClient, path: &str) -> Result<()> {
    for segment in utils::ancestors(path) {
        if client.exists(&segment).await? {
            continue;
        }
        match client.create(&segment, Bytes::new(), true).await {
            Ok(()) => debug!(path = %segment, "created path segment"),
            // Lost a creation race; the segment exists either way.
            Err(CoordinationError::NodeExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn delete_recursive<'a>(
    client: &'a dyn CoordinationClient,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let reply = match client.get_children(path, false).await {
            Ok(reply) => reply,
            Err(e) if e.is_node_missing() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for child in reply.children {
            let child_path = utils::join(path, &child);
            delete_recursive(client, &child_path).await?;
        }

        match client.delete(path).await {
            Ok(()) => {
                debug!(%path, "node deleted");
                Ok(())
            }
            Err(e) if e.is_node_missing() => Ok(()),
            Err(e) => Err(e.into()),
        }
    })
}
