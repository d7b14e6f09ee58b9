// Self-describing records exchanged between replica managers.
// Payload interpretation is delegated to the user's replica capabilities on
// the receiving end; the envelope only carries identity and timing.

use crate::{
    types::{GameTime, NetworkId},
    wire::{error::WireError, reader::ByteReader, writer::ByteWriter},
};

const FLAG_NETWORK_ID: u8 = 1 << 0;
const FLAG_TIMESTAMP: u8 = 1 << 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordTag {
    Construct,
    Destruct,
    ScopeChange,
    Serialize,
    DownloadComplete,
}

impl RecordTag {
    fn to_u8(self) -> u8 {
        match self {
            RecordTag::Construct => 0,
            RecordTag::Destruct => 1,
            RecordTag::ScopeChange => 2,
            RecordTag::Serialize => 3,
            RecordTag::DownloadComplete => 4,
        }
    }

    fn from_u8(value: u8) -> Result<Self, WireError> {
        match value {
            0 => Ok(RecordTag::Construct),
            1 => Ok(RecordTag::Destruct),
            2 => Ok(RecordTag::ScopeChange),
            3 => Ok(RecordTag::Serialize),
            4 => Ok(RecordTag::DownloadComplete),
            tag => Err(WireError::UnknownRecordTag { tag }),
        }
    }
}

/// One manager-originated message.
///
/// Construction records may carry a NetworkId (authoritative senders) or none
/// (the receiver assigns). DownloadComplete carries neither id nor timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRecord {
    pub tag: RecordTag,
    pub network_id: Option<NetworkId>,
    pub timestamp: Option<GameTime>,
    pub payload: Vec<u8>,
}

impl WireRecord {
    pub fn new(tag: RecordTag, network_id: Option<NetworkId>, payload: Vec<u8>) -> Self {
        Self {
            tag,
            network_id,
            timestamp: None,
            payload,
        }
    }

    pub fn with_timestamp(mut self, timestamp: GameTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn write(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();

        writer.write_u8(self.tag.to_u8());

        let mut flags = 0u8;
        if self.network_id.is_some() {
            flags |= FLAG_NETWORK_ID;
        }
        if self.timestamp.is_some() {
            flags |= FLAG_TIMESTAMP;
        }
        writer.write_u8(flags);

        if let Some(network_id) = self.network_id {
            writer.write_u32(network_id.to_u32());
        }
        if let Some(timestamp) = self.timestamp {
            writer.write_u32(timestamp);
        }
        writer.write_bytes(&self.payload);

        writer.to_bytes()
    }

    pub fn read(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = ByteReader::new(payload);

        let tag = RecordTag::from_u8(reader.read_u8()?)?;
        let flags = reader.read_u8()?;

        let network_id = if flags & FLAG_NETWORK_ID != 0 {
            Some(NetworkId::from_u32(reader.read_u32()?))
        } else {
            None
        };
        let timestamp = if flags & FLAG_TIMESTAMP != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };

        Ok(Self {
            tag,
            network_id,
            timestamp,
            payload: reader.remaining_bytes().to_vec(),
        })
    }
}
