/// A framed, type-tagged message body, opaque to the transport (spec
/// §6). `msg_type` mirrors the policy message's own discriminant so a
/// transport or a log line can identify a message without decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub msg_type: u8,
    pub body: Vec<u8>,
}
