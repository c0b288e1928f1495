use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,

    #[error("segment `{0}` is not a Key=Value pair")]
    MalformedSegment(String),

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("field {0} is empty")]
    EmptyField(&'static str),
}

/// Parsed fields of an IoT hub device connection string.
///
/// The format is semicolon-separated `Key=Value` pairs:
///
/// ```text
/// HostName=hub.example.net;DeviceId=dev01;SharedAccessKey=c2VjcmV0
/// ```
///
/// Values are split on the first `=` only, since base64 key material may
/// itself end in `=`. Unrecognized keys are ignored; the transport layer may
/// understand more of them than we do.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceCredentials {
    pub host_name: String,
    pub device_id: String,
    pub shared_access_key: String,
    pub gateway_host_name: Option<String>,
}

impl DeviceCredentials {
    pub fn parse(s: &str) -> Result<Self, ConnectionStringError> {
        if s.trim().is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;
        let mut gateway_host_name = None;

        for segment in s.split(';') {
            // Tolerate a trailing semicolon
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;

            match key {
                "HostName" => host_name = Some(value.to_string()),
                "DeviceId" => device_id = Some(value.to_string()),
                "SharedAccessKey" => shared_access_key = Some(value.to_string()),
                "GatewayHostName" => gateway_host_name = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            host_name: require("HostName", host_name)?,
            device_id: require("DeviceId", device_id)?,
            shared_access_key: require("SharedAccessKey", shared_access_key)?,
            gateway_host_name,
        })
    }
}

fn require(
    field: &'static str,
    value: Option<String>,
) -> Result<String, ConnectionStringError> {
    match value {
        None => Err(ConnectionStringError::MissingField(field)),
        Some(v) if v.is_empty() => Err(ConnectionStringError::EmptyField(field)),
        Some(v) => Ok(v),
    }
}
