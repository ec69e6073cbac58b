//! Grow-and-retry loop for buffer-filling queries

use log::debug;

use crate::domain::{BuildError, QueryError};

/// Bytes filled by a successful query, plus the entry count it reported
#[derive(Debug)]
pub struct QueryBuffer {
    pub bytes: Vec<u8>,
    pub count: usize,
}

/// Run `op` against a buffer of `seed` bytes, doubling the buffer each time
/// the query answers [`QueryError::NeedsCapacity`]
///
/// A capacity hint larger than the doubled size is honoured directly.
/// Growth past `max_buffer`, or an allocation the host cannot satisfy,
/// yields [`BuildError::AllocationFailed`]. Any other query error aborts
/// immediately with [`BuildError::QueryFailed`].
///
/// # Errors
/// See above
pub fn query_with_retry<F>(
    what: &str,
    seed: usize,
    max_buffer: usize,
    mut op: F,
) -> Result<QueryBuffer, BuildError>
where
    F: FnMut(&mut [u8]) -> Result<usize, QueryError>,
{
    let mut bytes: Vec<u8> = Vec::new();
    let mut capacity = seed.clamp(1, max_buffer.max(1));

    loop {
        grow(&mut bytes, capacity, what)?;

        match op(bytes.as_mut_slice()) {
            Ok(count) => return Ok(QueryBuffer { bytes, count }),
            Err(QueryError::NeedsCapacity(required)) => {
                let next = capacity.saturating_mul(2).max(required);
                if next > max_buffer {
                    return Err(BuildError::AllocationFailed {
                        what: what.to_string(),
                        requested: next,
                    });
                }
                debug!("Growing {what} buffer: {capacity} -> {next} bytes");
                capacity = next;
            }
            Err(source) => return Err(BuildError::query(what, source)),
        }
    }
}

fn grow(bytes: &mut Vec<u8>, capacity: usize, what: &str) -> Result<(), BuildError> {
    let additional = capacity.saturating_sub(bytes.len());
    bytes.try_reserve_exact(additional).map_err(|_| BuildError::AllocationFailed {
        what: what.to_string(),
        requested: capacity,
    })?;
    bytes.resize(capacity, 0);
    Ok(())
}
