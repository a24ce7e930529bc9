use std::convert::TryInto;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::hash::{kv_hash, Hash, HASH_LENGTH};
use super::{Link, Tree};
use crate::error::{Error, Result};

/// Converts a length to the 32-bit form used in records and hashes, or fails
/// with `Error::Length` if it does not fit.
pub(crate) fn length_u32(len: usize, what: &str) -> Result<u32> {
    len.try_into()
        .map_err(|_| Error::Length(format!("{} length {} exceeds u32::MAX", what, len)))
}

impl Link {
    /// Encodes the link as `key_len | key | hash | left_height | right_height`.
    /// Fails for `Link::Modified`, whose hash is not final.
    pub fn encode_into<W: Write>(&self, output: &mut W) -> Result<()> {
        if self.is_modified() {
            return Err(Error::Invariant(format!(
                "No encoding for Link::Modified ({})",
                hex::encode(self.key())
            )));
        }

        let key = self.key();
        output.write_u32::<LittleEndian>(length_u32(key.len(), "Key")?)?;
        output.write_all(key)?;
        output.write_all(&self.hash())?;

        let (left_height, right_height) = self.child_heights();
        output.write_u8(left_height)?;
        output.write_u8(right_height)?;

        Ok(())
    }

    pub fn encoding_length(&self) -> usize {
        4 + self.key().len() + HASH_LENGTH + 2
    }

    /// Decodes a link record into a `Link::Pruned`.
    fn decode_from(input: &mut Cursor<&[u8]>) -> Result<Self> {
        let key = read_bytes(input, "key")?;

        let mut hash: Hash = Default::default();
        input.read_exact(&mut hash).map_err(decode_err)?;

        let left_height = input.read_u8().map_err(decode_err)?;
        let right_height = input.read_u8().map_err(decode_err)?;

        Ok(Link::Pruned {
            hash,
            child_heights: (left_height, right_height),
            key,
        })
    }
}

impl Tree {
    /// Encodes the node as a record. The key is not part of the record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(self.encoding_length());
        self.encode_into(&mut output)?;
        Ok(output)
    }

    pub fn encode_into<W: Write>(&self, output: &mut W) -> Result<()> {
        let value = self.value();
        output.write_u32::<LittleEndian>(length_u32(value.len(), "Value")?)?;
        output.write_all(value)?;

        output.write_all(self.kv_hash())?;

        for &left in &[true, false] {
            match self.link(left) {
                None => output.write_u8(0)?,
                Some(link) => {
                    output.write_u8(1)?;
                    link.encode_into(output)?;
                }
            }
        }

        Ok(())
    }

    pub fn encoding_length(&self) -> usize {
        4 + self.value().len()
            + HASH_LENGTH
            + 1
            + self.link(true).map_or(0, Link::encoding_length)
            + 1
            + self.link(false).map_or(0, Link::encoding_length)
    }

    /// Decodes a node record stored under `key`. Child links are decoded as
    /// `Link::Pruned`. The record must be consumed exactly, and the stored kv
    /// hash must match the key and decoded value.
    pub fn decode(key: Vec<u8>, bytes: &[u8]) -> Result<Tree> {
        let mut input = Cursor::new(bytes);

        let value = read_bytes(&mut input, "value")?;

        let mut stored_kv_hash: Hash = Default::default();
        input
            .read_exact(&mut stored_kv_hash)
            .map_err(decode_err)?;

        let left = read_link(&mut input)?;
        let right = read_link(&mut input)?;

        if input.position() != bytes.len() as u64 {
            return Err(Error::Decode(format!(
                "{} trailing bytes in node record",
                bytes.len() as u64 - input.position()
            )));
        }

        if kv_hash(&key, &value) != stored_kv_hash {
            return Err(Error::Decode(format!(
                "KV hash mismatch for node {}",
                hex::encode(&key)
            )));
        }

        Ok(Tree::from_fields(key, value, stored_kv_hash, left, right))
    }
}

fn read_link(input: &mut Cursor<&[u8]>) -> Result<Option<Link>> {
    match input.read_u8().map_err(decode_err)? {
        0 => Ok(None),
        1 => Ok(Some(Link::decode_from(input)?)),
        flag => Err(Error::Decode(format!("Invalid link flag {}", flag))),
    }
}

fn read_bytes(input: &mut Cursor<&[u8]>, what: &str) -> Result<Vec<u8>> {
    let len = input.read_u32::<LittleEndian>().map_err(decode_err)? as u64;
    let remaining = input.get_ref().len() as u64 - input.position();
    if len > remaining {
        return Err(Error::Decode(format!(
            "{} length {} exceeds remaining {} bytes",
            what, len, remaining
        )));
    }

    let mut bytes = vec![0; len as usize];
    input.read_exact(&mut bytes).map_err(decode_err)?;
    Ok(bytes)
}

fn decode_err(err: std::io::Error) -> Error {
    Error::Decode(err.to_string())
}
