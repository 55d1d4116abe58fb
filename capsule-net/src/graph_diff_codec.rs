//! Wire codec for [`GraphDiffMessage`]: line-framed sections,
//! each a keyword line, a decimal length line, then that many items.
//! Hash addresses are written one per line as fixed-length uppercase
//! hex (via [`Hash`]'s `Display`/`FromStr`); records in the `data`
//! section are one self-describing JSON object per line.

use std::str::FromStr;

use capsule_common::{Error, Hash, Record};
use capsule_policy::GraphDiffMessage;

use crate::envelope::Envelope;

fn write_hash_section(buf: &mut Vec<u8>, keyword: &str, hashes: &[Hash]) {
    buf.extend_from_slice(format!("{keyword}\n{}\n", hashes.len()).as_bytes());
    for hash in hashes {
        buf.extend_from_slice(hash.to_string().as_bytes());
        buf.push(b'\n');
    }
}

fn write_data_section(buf: &mut Vec<u8>, records: &[Record]) -> Result<(), Error> {
    buf.extend_from_slice(format!("data\n{}\n", records.len()).as_bytes());
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| Error::Decode(e.to_string()))?;
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    Ok(())
}

pub fn encode(msg: &GraphDiffMessage) -> Result<Envelope, Error> {
    let mut body = Vec::new();
    match msg {
        GraphDiffMessage::First { begins, ends } => {
            write_hash_section(&mut body, "begins", begins);
            write_hash_section(&mut body, "ends", ends);
        }
        GraphDiffMessage::Second { data, begins, ends } => {
            write_data_section(&mut body, data)?;
            write_hash_section(&mut body, "begins", begins);
            write_hash_section(&mut body, "ends", ends);
        }
        GraphDiffMessage::Third { requests, data } => {
            write_hash_section(&mut body, "requests", requests);
            write_data_section(&mut body, data)?;
        }
        GraphDiffMessage::Fourth { data } => {
            write_data_section(&mut body, data)?;
        }
    }
    Ok(Envelope { msg_type: msg.type_num(), body })
}

/// A cursor over the line-framed body of one message.
struct Sections {
    lines: Vec<String>,
    pos: usize,
}

impl Sections {
    fn parse(body: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(body).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self {
            lines: text.lines().map(str::to_string).collect(),
            pos: 0,
        })
    }

    fn next_line(&mut self) -> Result<&str, Error> {
        let line = self
            .lines
            .get(self.pos)
            .ok_or_else(|| Error::Decode("unexpected end of message".to_string()))?;
        self.pos += 1;
        Ok(line.as_str())
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        let line = self.next_line()?;
        usize::from_str(line).map_err(|_| Error::Decode(format!("invalid length line: {line}")))
    }

    fn read_hash_section(&mut self, keyword: &str) -> Result<Vec<Hash>, Error> {
        let line = self.next_line()?;
        if line != keyword {
            return Err(Error::Decode(format!("expected '{keyword}' section, got '{line}'")));
        }
        let count = self.read_length()?;
        (0..count)
            .map(|_| {
                self.next_line()
                    .and_then(|l| Hash::from_str(l).map_err(|e| Error::Decode(e.to_string())))
            })
            .collect()
    }

    fn read_data_section(&mut self) -> Result<Vec<Record>, Error> {
        let line = self.next_line()?;
        if line != "data" {
            return Err(Error::Decode(format!("expected 'data' section, got '{line}'")));
        }
        let count = self.read_length()?;
        (0..count)
            .map(|_| {
                self.next_line()
                    .and_then(|l| serde_json::from_str(l).map_err(|e| Error::Decode(e.to_string())))
            })
            .collect()
    }
}

pub fn decode(envelope: &Envelope) -> Result<GraphDiffMessage, Error> {
    let mut sections = Sections::parse(&envelope.body)?;
    match envelope.msg_type {
        1 => Ok(GraphDiffMessage::First {
            begins: sections.read_hash_section("begins")?,
            ends: sections.read_hash_section("ends")?,
        }),
        2 => Ok(GraphDiffMessage::Second {
            data: sections.read_data_section()?,
            begins: sections.read_hash_section("begins")?,
            ends: sections.read_hash_section("ends")?,
        }),
        3 => Ok(GraphDiffMessage::Third {
            requests: sections.read_hash_section("requests")?,
            data: sections.read_data_section()?,
        }),
        4 => Ok(GraphDiffMessage::Fourth { data: sections.read_data_section()? }),
        other => Err(Error::UnknownMsgType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    fn record(hash: u8) -> Record {
        Record {
            hash: h(hash),
            rec_no: hash as i64,
            timestamp: 0,
            accuracy: 1.0,
            prev_hash: Hash::NULL,
            value: vec![1, 2, 3],
            sig: vec![],
        }
    }

    #[test]
    fn first_round_trips() {
        let msg = GraphDiffMessage::First { begins: vec![h(1)], ends: vec![h(2), h(3)] };
        let envelope = encode(&msg).unwrap();
        assert_eq!(envelope.msg_type, 1);
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn second_round_trips_with_data() {
        let msg = GraphDiffMessage::Second {
            data: vec![record(1), record(2)],
            begins: vec![h(1)],
            ends: vec![h(2)],
        };
        let envelope = encode(&msg).unwrap();
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn third_round_trips() {
        let msg = GraphDiffMessage::Third { requests: vec![h(9)], data: vec![] };
        let envelope = encode(&msg).unwrap();
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn fourth_round_trips() {
        let msg = GraphDiffMessage::Fourth { data: vec![record(5)] };
        let envelope = encode(&msg).unwrap();
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn mismatched_section_keyword_is_a_decode_error() {
        let envelope = Envelope { msg_type: 1, body: b"ends\n0\nbegins\n0\n".to_vec() };
        assert!(matches!(decode(&envelope), Err(Error::Decode(_))));
    }

    #[test]
    fn truncated_body_is_a_decode_error() {
        let envelope = Envelope { msg_type: 1, body: b"begins\n2\n".to_vec() };
        assert!(matches!(decode(&envelope), Err(Error::Decode(_))));
    }
}
