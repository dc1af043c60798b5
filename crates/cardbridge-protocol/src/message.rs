//! Relay message model.
//!
//! Requests and replies exchanged with the relay peer are a single tagged
//! union, [`Message`]. Requests carry a [`Payload`] or a
//! [`Message::RequestRelayInfo`]; replies carry a [`Payload`] holding the
//! card's response bytes or the bridge's [`RelayInfo`].
//!
//! Byte fields serialize as upper-case hex strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cardbridge_core::{Advertisement, MacAddress};

/// Kind of payload carried by a [`Payload`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PayloadType {
    /// No type set by the sender.
    Unspecified,
    /// Opaque command/response exchange with the card (APDU).
    PcscReader,
    /// Vendor control command addressed to the reader itself.
    PcscReaderControl,
    /// Direct card access without a reader layer.
    PcscCard,
}

/// Kind of connection the bridge exposes to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConnectionType {
    Unspecified,
    Pcsc,
    Nfc,
}

/// A card or reader command, or the response to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub payload_type: PayloadType,

    /// Control code, only meaningful for [`PayloadType::PcscReaderControl`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<u32>,

    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

impl Payload {
    /// Create a card exchange payload.
    pub fn exchange(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload_type: PayloadType::PcscReader,
            control: None,
            payload: payload.into(),
        }
    }

    /// Create a reader-control payload.
    pub fn control(code: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload_type: PayloadType::PcscReaderControl,
            control: Some(code),
            payload: payload.into(),
        }
    }

    /// Build the reply to this payload carrying `response`.
    pub fn reply(&self, response: Vec<u8>) -> Self {
        Self {
            payload_type: self.payload_type,
            control: None,
            payload: response,
        }
    }
}

/// Capability descriptor advertised to relay peers.
///
/// Built once after the card session is established and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayInfo {
    pub supported_payload_types: Vec<PayloadType>,
    pub connection_type: ConnectionType,
    #[serde(with = "hex_bytes")]
    pub atr: Vec<u8>,
    pub device_name: String,
    #[serde(with = "hex_bytes")]
    pub device_address: Vec<u8>,
    pub rssi: i32,
}

impl RelayInfo {
    /// Payload kinds served by a BLE card reader bridge.
    pub const READER_PAYLOAD_TYPES: [PayloadType; 2] =
        [PayloadType::PcscReader, PayloadType::PcscReaderControl];

    /// Describe a reader bridge for the device found by a scan.
    pub fn for_reader(atr: Vec<u8>, device_name: impl Into<String>, found: &Advertisement) -> Self {
        Self {
            supported_payload_types: Self::READER_PAYLOAD_TYPES.to_vec(),
            connection_type: ConnectionType::Pcsc,
            atr,
            device_name: device_name.into(),
            device_address: found.address.to_vec(),
            rssi: i32::from(found.rssi),
        }
    }

    /// Whether payloads of this type are accepted.
    pub fn supports(&self, payload_type: PayloadType) -> bool {
        self.supported_payload_types.contains(&payload_type)
    }

    /// The device address as a [`MacAddress`], if it has the right length.
    pub fn mac_address(&self) -> Option<MacAddress> {
        <[u8; 6]>::try_from(self.device_address.as_slice())
            .ok()
            .map(MacAddress::new)
    }
}

/// Relay request/reply union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Message {
    /// Card exchange or reader control (request), or its result (reply).
    Payload(Payload),

    /// Ask the bridge for its capability descriptor.
    RequestRelayInfo,

    /// Capability descriptor (reply only).
    RelayInfo(RelayInfo),
}

impl Message {
    /// Short variant name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Payload(_) => "payload",
            Message::RequestRelayInfo => "request_relay_info",
            Message::RelayInfo(_) => "relay_info",
        }
    }
}

/// Routing metadata attached to every message on the broker link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Pairs a reply with its request.
    pub correlation_id: Uuid,

    /// Relay the message is addressed to or sent from.
    pub relay_id: String,
}

impl EnvelopeMeta {
    pub fn new(relay_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            relay_id: relay_id.into(),
        }
    }
}

/// Message plus routing metadata, the unit framed by [`crate::RelayCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub message: Message,
}

impl Envelope {
    pub fn new(meta: EnvelopeMeta, message: Message) -> Self {
        Self { meta, message }
    }

    /// Build the reply envelope for this request.
    pub fn reply(&self, relay_id: impl Into<String>, message: Message) -> Self {
        Self {
            meta: EnvelopeMeta {
                correlation_id: self.meta.correlation_id,
                relay_id: relay_id.into(),
            },
            message,
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_advertisement() -> Advertisement {
        Advertisement::new(
            MacAddress::new([0xD4, 0x01, 0x02, 0x03, 0x04, 0x05]),
            "ACR1555U-J1",
            -61,
        )
    }

    #[test]
    fn test_relay_info_for_reader() {
        let info = RelayInfo::for_reader(vec![0x3B, 0x80], "ACR1555U PICC", &test_advertisement());

        assert_eq!(
            info.supported_payload_types,
            vec![PayloadType::PcscReader, PayloadType::PcscReaderControl]
        );
        assert_eq!(info.connection_type, ConnectionType::Pcsc);
        assert_eq!(info.device_address, vec![0xD4, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(info.rssi, -61);
        assert!(info.supports(PayloadType::PcscReaderControl));
        assert!(!info.supports(PayloadType::PcscCard));
        assert_eq!(info.mac_address(), Some(test_advertisement().address));
    }

    #[test]
    fn test_payload_reply_keeps_type() {
        let request = Payload::control(0x3500, vec![0xE0]);
        let reply = request.reply(vec![0x90, 0x00]);

        assert_eq!(reply.payload_type, PayloadType::PcscReaderControl);
        assert_eq!(reply.control, None);
        assert_eq!(reply.payload, vec![0x90, 0x00]);
    }

    #[test]
    fn test_message_json_shape() {
        let message = Message::Payload(Payload::exchange(vec![0x00, 0xA4, 0x04, 0x00]));
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "payload");
        assert_eq!(json["body"]["payload_type"], "pcsc_reader");
        assert_eq!(json["body"]["payload"], "00A40400");
        assert!(json["body"].get("control").is_none());
    }

    #[test]
    fn test_unit_variant_json() {
        let json = serde_json::to_string(&Message::RequestRelayInfo).unwrap();
        assert_eq!(json, r#"{"type":"request_relay_info"}"#);

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Message::RequestRelayInfo);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        let json = r#"{"type":"payload","body":{"payload_type":"pcsc_reader","payload":"XYZ"}}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_envelope_reply_keeps_correlation() {
        let request = Envelope::new(EnvelopeMeta::new("peer"), Message::RequestRelayInfo);
        let reply = request.reply("relay-1", Message::RequestRelayInfo);

        assert_eq!(reply.meta.correlation_id, request.meta.correlation_id);
        assert_eq!(reply.meta.relay_id, "relay-1");
    }
}
