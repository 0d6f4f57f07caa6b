use super::*;
use crate::error::Error;

/// Starts a chunk of bytes that are copied verbatim.
pub const LITERAL_TAG: u8 = 0;

/// Starts a chunk containing a single byte that is repeated.
pub const RUN_TAG: u8 = 1;

/// Neither runs nor literal spans can be longer than a single length byte allows.
pub const MAX_CHUNK_LENGTH: usize = 255;

/// A single byte is never worth a run chunk.
const MIN_RUN_LENGTH: usize = 2;


/// Encode the bytes as a sequence of `[RUN_TAG, length, value]`
/// and `[LITERAL_TAG, length, values...]` chunks.
/// Every run of at least two equal bytes becomes a run chunk,
/// all remaining bytes are collected into literal chunks.
pub fn compress_bytes(data: Bytes<'_>) -> ByteVec {
    let mut compressed = Vec::with_capacity(data.len());
    let mut literal_start = 0;
    let mut run_start = 0;

    while run_start < data.len() {
        let mut run_end = run_start + 1;

        while
            run_end < data.len()
                && data[run_start] == data[run_end]
                && run_end - run_start < MAX_CHUNK_LENGTH
            {
                run_end += 1;
            }

        if run_end - run_start >= MIN_RUN_LENGTH {
            push_literal_chunks(&mut compressed, &data[literal_start .. run_start]);

            compressed.push(RUN_TAG);
            compressed.push((run_end - run_start) as u8);
            compressed.push(data[run_start]);

            run_start = run_end;
            literal_start = run_end;
        }
        else {
            run_start += 1;

            if run_start - literal_start == MAX_CHUNK_LENGTH {
                push_literal_chunks(&mut compressed, &data[literal_start .. run_start]);
                literal_start = run_start;
            }
        }
    }

    push_literal_chunks(&mut compressed, &data[literal_start ..]);
    compressed
}

/// Expand all run and literal chunks.
/// The expected byte size is only used to reserve memory.
pub fn decompress_bytes(mut remaining: Bytes<'_>, expected_byte_size: usize) -> Result<ByteVec> {
    let mut decompressed = Vec::with_capacity(expected_byte_size.min(8*2048));

    while !remaining.is_empty() {
        let tag = take_1(&mut remaining)?;
        let count = take_1(&mut remaining)? as usize;

        if count == 0 {
            return Err(Error::invalid("empty rle chunk"));
        }

        match tag {
            RUN_TAG => {
                // repeat the next value 'count' times
                let value = take_1(&mut remaining)?;
                decompressed.resize(decompressed.len() + count, value);
            },

            LITERAL_TAG => {
                // take the next 'count' bytes as-is
                let values = take_n(&mut remaining, count)?;
                decompressed.extend_from_slice(values);
            },

            _ => return Err(Error::invalid("rle chunk tag")),
        }
    }

    Ok(decompressed)
}

fn push_literal_chunks(compressed: &mut ByteVec, literals: Bytes<'_>) {
    for chunk in literals.chunks(MAX_CHUNK_LENGTH) {
        compressed.push(LITERAL_TAG);
        compressed.push(chunk.len() as u8);
        compressed.extend_from_slice(chunk);
    }
}

fn take_1(slice: &mut &[u8]) -> Result<u8> {
    if !slice.is_empty() {
        let result = slice[0];
        *slice = &slice[1..];
        Ok(result)

    } else {
        Err(Error::invalid("compressed data"))
    }
}

fn take_n<'s>(slice: &mut &'s [u8], n: usize) -> Result<&'s [u8]> {
    if n <= slice.len() {
        let (front, back) = slice.split_at(n);
        *slice = back;
        Ok(front)

    } else {
        Err(Error::invalid("compressed data"))
    }
}
