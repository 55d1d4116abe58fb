//! Wire codec for [`NaiveMessage`]: a single self-describing JSON object
//! per message, tagged by `msg_num`. Fields the source's
//! `NaiveMsgContent` carries but no transition ever populates
//! (`HashesWeWant`, `RecordsTheyWant`) aren't represented here; a Rust
//! enum only needs a variant's actual payload.

use capsule_common::{Error, Hash, Record};
use capsule_policy::NaiveMessage;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

#[derive(Serialize, Deserialize)]
struct NaiveWire {
    msg_num: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hashes_all: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hashes_they_want: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    records_we_want: Vec<Record>,
}

impl From<&NaiveMessage> for NaiveWire {
    fn from(msg: &NaiveMessage) -> Self {
        match msg {
            NaiveMessage::First { hashes_all } => NaiveWire {
                msg_num: 1,
                hashes_all: hashes_all.clone(),
                hashes_they_want: Vec::new(),
                records_we_want: Vec::new(),
            },
            NaiveMessage::Second { hashes_they_want, records_we_want } => NaiveWire {
                msg_num: 2,
                hashes_all: Vec::new(),
                hashes_they_want: hashes_they_want.clone(),
                records_we_want: records_we_want.clone(),
            },
            NaiveMessage::Third { records_we_want } => NaiveWire {
                msg_num: 3,
                hashes_all: Vec::new(),
                hashes_they_want: Vec::new(),
                records_we_want: records_we_want.clone(),
            },
        }
    }
}

impl TryFrom<NaiveWire> for NaiveMessage {
    type Error = Error;

    fn try_from(wire: NaiveWire) -> Result<Self, Error> {
        match wire.msg_num {
            1 => Ok(NaiveMessage::First { hashes_all: wire.hashes_all }),
            2 => Ok(NaiveMessage::Second {
                hashes_they_want: wire.hashes_they_want,
                records_we_want: wire.records_we_want,
            }),
            3 => Ok(NaiveMessage::Third { records_we_want: wire.records_we_want }),
            other => Err(Error::UnknownMsgType(other)),
        }
    }
}

pub fn encode(msg: &NaiveMessage) -> Result<Envelope, Error> {
    let wire = NaiveWire::from(msg);
    let body = serde_json::to_vec(&wire).map_err(|e| Error::Decode(e.to_string()))?;
    Ok(Envelope { msg_type: msg.msg_num(), body })
}

pub fn decode(envelope: &Envelope) -> Result<NaiveMessage, Error> {
    let wire: NaiveWire =
        serde_json::from_slice(&envelope.body).map_err(|e| Error::Decode(e.to_string()))?;
    NaiveMessage::try_from(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash {
        Hash::from_bytes([n; 32])
    }

    #[test]
    fn first_round_trips() {
        let msg = NaiveMessage::First { hashes_all: vec![h(1), h(2)] };
        let envelope = encode(&msg).unwrap();
        assert_eq!(envelope.msg_type, 1);
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn second_round_trips_with_empty_records() {
        let msg = NaiveMessage::Second { hashes_they_want: vec![h(3)], records_we_want: vec![] };
        let envelope = encode(&msg).unwrap();
        assert_eq!(decode(&envelope).unwrap(), msg);
    }

    #[test]
    fn unknown_msg_num_is_rejected() {
        let envelope = Envelope { msg_type: 9, body: br#"{"msg_num":9}"#.to_vec() };
        assert!(matches!(decode(&envelope), Err(Error::UnknownMsgType(9))));
    }
}
