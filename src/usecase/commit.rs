//! Write-and-pulse commit sequencer.
//!
//! The sequence is six gateway I/O calls: read the configuration block,
//! write it back with the edits applied, then raise the handshake flag,
//! dwell, and clear it. The gateway lock is taken per call, so a poll cycle
//! may run between steps — the poller never touches the configuration
//! block, so no half-applied state is observable. The dwell wait holds no
//! lock. The first failing step aborts the remainder; nothing already
//! written is rolled back, and a handshake left high is diagnosable at the
//! controller.

use std::time::Duration;

use tracing::{debug, info};

use crate::core::codec::RegisterImage;
use crate::core::model::SessionState;
use crate::core::schema::RegisterSchema;
use crate::error::{CommitError, CommitStep};
use crate::usecase::gateway::SessionGateway;

/// One register edit: byte offset within the configuration block plus the
/// encoded value. Offsets come from the static schema; an out-of-range
/// offset is a programming error, not a runtime condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterEdit {
    pub offset: u16,
    pub value: i16,
}

/// Execute the full read-modify-write-then-pulse sequence.
pub async fn commit(
    gateway: &SessionGateway,
    schema: &RegisterSchema,
    dwell: Duration,
    edits: &[RegisterEdit],
) -> Result<(), CommitError> {
    if gateway.state() != SessionState::Connected {
        return Err(CommitError::NotConnected);
    }

    // Read-modify-write: unrelated offsets inside the block survive.
    let bytes = gateway
        .read_block(schema.block, schema.start, schema.size)
        .await
        .map_err(|source| CommitError::Io {
            step: CommitStep::BlockRead,
            source,
        })?;
    let mut image = RegisterImage::new(bytes);
    for edit in edits {
        image.set_i16(edit.offset, edit.value);
    }
    gateway
        .write_block(schema.block, schema.start, image.as_bytes())
        .await
        .map_err(|source| CommitError::Io {
            step: CommitStep::BlockWrite,
            source,
        })?;
    debug!(edits = edits.len(), "configuration block written");

    set_handshake(gateway, schema, true).await?;
    tokio::time::sleep(dwell).await;
    set_handshake(gateway, schema, false).await?;

    info!(edits = edits.len(), "configuration committed and pulsed");
    Ok(())
}

/// Read-modify-write of the handshake flag, mirroring the marker byte's
/// access pattern on the controller.
async fn set_handshake(
    gateway: &SessionGateway,
    schema: &RegisterSchema,
    value: bool,
) -> Result<(), CommitError> {
    let (read_step, write_step) = if value {
        (CommitStep::PulseReadHigh, CommitStep::PulseWriteHigh)
    } else {
        (CommitStep::PulseReadLow, CommitStep::PulseWriteLow)
    };

    let _current = gateway
        .read_bit(schema.handshake.byte_base, schema.handshake.bit)
        .await
        .map_err(|source| CommitError::Io {
            step: read_step,
            source,
        })?;
    gateway
        .write_bit(schema.handshake.byte_base, schema.handshake.bit, value)
        .await
        .map_err(|source| CommitError::Io {
            step: write_step,
            source,
        })
}
