use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CodecError {
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "Truncated record at offset {}: needed {} bytes, {} available",
                offset, needed, available
            ),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Debug)]
pub enum ChannelError {
    SocketError(std::io::Error),
    SendError(std::io::Error),
    ReceiveError(std::io::Error),
    DeadlineExceeded,
    Malformed(String),
    Kernel(i32),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::SocketError(e) => write!(f, "Netlink socket error: {}", e),
            ChannelError::SendError(e) => write!(f, "Netlink send error: {}", e),
            ChannelError::ReceiveError(e) => write!(f, "Netlink receive error: {}", e),
            ChannelError::DeadlineExceeded => write!(f, "Read deadline exceeded"),
            ChannelError::Malformed(e) => write!(f, "Malformed netlink message: {}", e),
            ChannelError::Kernel(errno) => write!(
                f,
                "Kernel reported error: {}",
                std::io::Error::from_raw_os_error(*errno)
            ),
        }
    }
}

impl std::error::Error for ChannelError {}

#[derive(Debug)]
pub enum SessionError {
    ConnectionFailed(ChannelError),
    HandshakeRejected,
    ShutdownRequestFailed(ChannelError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ConnectionFailed(e) => write!(f, "Connection to kernel failed: {}", e),
            SessionError::HandshakeRejected => write!(f, "Kernel handshake failed"),
            SessionError::ShutdownRequestFailed(e) => {
                write!(f, "Shutdown request failed: {}", e)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum SinkError {
    OpenFailed(std::io::Error),
    WriteFailed(std::io::Error),
    FlushFailed(std::io::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::OpenFailed(e) => write!(f, "Output open failed: {}", e),
            SinkError::WriteFailed(e) => write!(f, "Output write failed: {}", e),
            SinkError::FlushFailed(e) => write!(f, "Output flush failed: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    SessionError(SessionError),
    SinkError(SinkError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::SessionError(e) => write!(f, "Session error: {}", e),
            ControllerError::SinkError(e) => write!(f, "Sink error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        ControllerError::SessionError(err)
    }
}

impl From<SinkError> for ControllerError {
    fn from(err: SinkError) -> Self {
        ControllerError::SinkError(err)
    }
}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}
