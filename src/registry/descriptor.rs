use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::CodecError;

/// Unique key of a command descriptor within the registry.
///
/// Equals the child node name under the command root.
pub type ServiceId = String;

/// The serializable unit of command metadata.
///
/// Beyond `service_id` the fields are opaque payload to the mirror: the
/// core only ever compares descriptors by encoded-byte equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Unique key within the registry
    pub service_id: ServiceId,

    /// Executable or verb this command runs
    pub command: String,

    #[serde(default)]
    pub arguments: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl CommandDescriptor {
    pub fn new(service_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            command: command.into(),
            arguments: Vec::new(),
            working_dir: None,
            environment: BTreeMap::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Byte codec for descriptors stored as node data.
pub trait DescriptorCodec: Send + Sync {
    fn encode(&self, descriptor: &CommandDescriptor) -> std::result::Result<Bytes, CodecError>;
    fn decode(&self, bytes: &[u8]) -> std::result::Result<CommandDescriptor, CodecError>;
}

/// Default codec backed by bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl DescriptorCodec for BincodeCodec {
    fn encode(&self, descriptor: &CommandDescriptor) -> std::result::Result<Bytes, CodecError> {
        bincode::serialize(descriptor)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<CommandDescriptor, CodecError> {
        bincode::deserialize(bytes).map_err(CodecError::Decode)
    }
}
