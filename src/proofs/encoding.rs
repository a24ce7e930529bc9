use std::convert::TryFrom;
use std::io::{self, ErrorKind, Read, Write};

use ed::{Decode, Encode, Terminated};

use super::{Node, Op};
use crate::error::{Error, Result};
use crate::tree::HASH_LENGTH;

impl Encode for Op {
    fn encode_into<W: Write>(&self, dest: &mut W) -> ed::Result<()> {
        match self {
            Op::Push(Node::Hash(hash)) => {
                dest.write_all(&[0x01])?;
                dest.write_all(hash)?;
            }
            Op::Push(Node::KVHash(kv_hash)) => {
                dest.write_all(&[0x02])?;
                dest.write_all(kv_hash)?;
            }
            Op::Push(Node::KV(key, value)) => {
                dest.write_all(&[0x03])?;
                write_bytes(dest, key)?;
                write_bytes(dest, value)?;
            }
            Op::Parent => dest.write_all(&[0x10])?,
            Op::Child => dest.write_all(&[0x11])?,
        };
        Ok(())
    }

    fn encoding_length(&self) -> ed::Result<usize> {
        Ok(op_length(self))
    }
}

impl Decode for Op {
    fn decode<R: Read>(mut input: R) -> ed::Result<Self> {
        let variant: u8 = Decode::decode(&mut input)?;

        Ok(match variant {
            0x01 => {
                let mut hash = [0; HASH_LENGTH];
                input.read_exact(&mut hash)?;
                Op::Push(Node::Hash(hash))
            }
            0x02 => {
                let mut hash = [0; HASH_LENGTH];
                input.read_exact(&mut hash)?;
                Op::Push(Node::KVHash(hash))
            }
            0x03 => {
                let key = read_bytes(&mut input)?;
                let value = read_bytes(&mut input)?;
                Op::Push(Node::KV(key, value))
            }
            0x10 => Op::Parent,
            0x11 => Op::Child,
            byte => {
                return Err(ed::Error::UnexpectedByte(byte));
            }
        })
    }
}

impl Terminated for Op {}

/// Writes a `u32` length prefix followed by the bytes.
fn write_bytes<W: Write>(dest: &mut W, bytes: &[u8]) -> ed::Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("length {} does not fit in u32", bytes.len()),
        )
    })?;
    len.encode_into(dest)?;
    dest.write_all(bytes)?;
    Ok(())
}

/// Reads a `u32` length prefix followed by that many bytes. Only as many bytes
/// as are actually present are allocated.
fn read_bytes<R: Read>(input: &mut R) -> ed::Result<Vec<u8>> {
    let len: u32 = Decode::decode(&mut *input)?;
    let mut bytes = Vec::new();
    input.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len as usize {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("expected {} bytes, got {}", len, bytes.len()),
        )
        .into());
    }
    Ok(bytes)
}

fn op_length(op: &Op) -> usize {
    match op {
        Op::Push(Node::Hash(_)) => 1 + HASH_LENGTH,
        Op::Push(Node::KVHash(_)) => 1 + HASH_LENGTH,
        Op::Push(Node::KV(key, value)) => 1 + 4 + key.len() + 4 + value.len(),
        Op::Parent => 1,
        Op::Child => 1,
    }
}

impl Op {
    pub fn encode_into<W: Write>(&self, dest: &mut W) -> Result<()> {
        if let Op::Push(Node::KV(key, value)) = self {
            if u32::try_from(key.len()).is_err() || u32::try_from(value.len()).is_err() {
                return Err(Error::Length(format!(
                    "KV of {} + {} bytes cannot be encoded in a proof",
                    key.len(),
                    value.len()
                )));
            }
        }
        Ok(Encode::encode_into(self, dest)?)
    }

    pub fn encoding_length(&self) -> usize {
        op_length(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Decode::decode(bytes)?)
    }
}

/// Encodes the ops into `output`, one after another.
pub fn encode_into<'a, T: Iterator<Item = &'a Op>>(ops: T, output: &mut Vec<u8>) -> Result<()> {
    for op in ops {
        op.encode_into(output)?;
    }
    Ok(())
}

/// Iterates over the ops of an encoded proof. Stops after the first decoding
/// error.
pub struct Decoder<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(proof_bytes: &'a [u8]) -> Self {
        Decoder {
            offset: 0,
            bytes: proof_bytes,
        }
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<Op>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let bytes = &self.bytes[self.offset..];
        Some(match Op::decode(bytes) {
            Ok(op) => {
                self.offset += op.encoding_length();
                Ok(op)
            }
            Err(err) => {
                self.offset = self.bytes.len();
                Err(err)
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::super::{Node, Op};
    use super::*;
    use crate::tree::HASH_LENGTH;

    #[test]
    fn encode_push_hash() {
        let op = Op::Push(Node::Hash([123; HASH_LENGTH]));
        assert_eq!(op.encoding_length(), 1 + HASH_LENGTH);

        let mut bytes = vec![];
        op.encode_into(&mut bytes).expect("encode failed");
        let mut expected = vec![0x01];
        expected.extend_from_slice(&[123; HASH_LENGTH]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encode_push_kvhash() {
        let op = Op::Push(Node::KVHash([123; HASH_LENGTH]));
        assert_eq!(op.encoding_length(), 1 + HASH_LENGTH);

        let mut bytes = vec![];
        op.encode_into(&mut bytes).expect("encode failed");
        let mut expected = vec![0x02];
        expected.extend_from_slice(&[123; HASH_LENGTH]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encode_push_kv() {
        let op = Op::Push(Node::KV(vec![1, 2, 3], vec![4, 5, 6]));
        assert_eq!(op.encoding_length(), 15);

        let mut bytes = vec![];
        op.encode_into(&mut bytes).expect("encode failed");
        assert_eq!(
            bytes,
            vec![0x03, 0, 0, 0, 3, 1, 2, 3, 0, 0, 0, 3, 4, 5, 6]
        );
    }

    #[test]
    fn encode_parent_and_child() {
        let mut bytes = vec![];
        encode_into([Op::Parent, Op::Child].iter(), &mut bytes).expect("encode failed");
        assert_eq!(bytes, vec![0x10, 0x11]);
        assert_eq!(Op::Parent.encoding_length(), 1);
        assert_eq!(Op::Child.encoding_length(), 1);
    }

    #[test]
    fn decode_push_hash() {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&[123; HASH_LENGTH]);
        let op = Op::decode(&bytes[..]).expect("decode failed");
        assert_eq!(op, Op::Push(Node::Hash([123; HASH_LENGTH])));
    }

    #[test]
    fn decode_push_kvhash() {
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&[123; HASH_LENGTH]);
        let op = Op::decode(&bytes[..]).expect("decode failed");
        assert_eq!(op, Op::Push(Node::KVHash([123; HASH_LENGTH])));
    }

    #[test]
    fn decode_push_kv() {
        let bytes = [0x03, 0, 0, 0, 3, 1, 2, 3, 0, 0, 0, 3, 4, 5, 6];
        let op = Op::decode(&bytes[..]).expect("decode failed");
        assert_eq!(op, Op::Push(Node::KV(vec![1, 2, 3], vec![4, 5, 6])));
    }

    #[test]
    fn decode_parent() {
        let bytes = [0x10];
        let op = Op::decode(&bytes[..]).expect("decode failed");
        assert_eq!(op, Op::Parent);
    }

    #[test]
    fn decode_child() {
        let bytes = [0x11];
        let op = Op::decode(&bytes[..]).expect("decode failed");
        assert_eq!(op, Op::Child);
    }

    #[test]
    fn decode_unknown() {
        let bytes = [0x88];
        assert!(Op::decode(&bytes[..]).is_err());
    }

    #[test]
    fn decode_truncated_kv() {
        let bytes = [0x03, 0xff, 0xff, 0xff, 0xff, 1, 2];
        assert!(Op::decode(&bytes[..]).is_err());
    }

    #[test]
    fn decoder_sequence() {
        let ops = vec![
            Op::Push(Node::KV(vec![1], vec![2])),
            Op::Push(Node::Hash([7; HASH_LENGTH])),
            Op::Child,
        ];
        let mut bytes = vec![];
        encode_into(ops.iter(), &mut bytes).expect("encode failed");

        let decoded: Vec<Op> = Decoder::new(&bytes)
            .collect::<Result<_>>()
            .expect("decode failed");
        assert_eq!(decoded, ops);
    }

    #[test]
    fn decoder_stops_after_error() {
        let bytes = [0x10, 0x99, 0x10];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.next().expect("expected op").expect("decode failed"), Op::Parent);
        assert!(decoder.next().expect("expected item").is_err());
        assert!(decoder.next().is_none());
    }
}
