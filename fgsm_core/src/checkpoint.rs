//! Classifier weight files.
//!
//! A weights file is a fixed header (`FGSW` magic plus a format version)
//! followed by the model snapshot, both written with one deterministic
//! bincode codec. Files from other tools or older layouts are rejected
//! before the payload is decoded.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const MAGIC: [u8; 4] = *b"FGSW";

#[derive(Debug)]
pub enum CheckpointError {
    Io(std::io::Error),
    Codec(bincode::Error),
    /// The header does not start with the weights-file magic.
    NotAWeightsFile,
    VersionMismatch { expected: u32, found: u32 },
    /// Decoded parameters do not fit the architecture they claim.
    InvalidFormat(String),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(err) => write!(f, "cannot access weights file: {err}"),
            CheckpointError::Codec(err) => write!(f, "corrupt weights payload: {err}"),
            CheckpointError::NotAWeightsFile => {
                write!(f, "file is not a classifier weights file")
            }
            CheckpointError::VersionMismatch { expected, found } => write!(
                f,
                "weights format version {found} is not supported (expected {expected})"
            ),
            CheckpointError::InvalidFormat(msg) => write!(f, "inconsistent weights: {msg}"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(err) => Some(err),
            CheckpointError::Codec(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Codec(err)
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Writes `payload` behind a header carrying `version`, creating parent
/// directories as needed.
pub fn write_versioned_snapshot<P, T>(
    path: P,
    version: u32,
    payload: &T,
) -> Result<(), CheckpointError>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let header = Header {
        magic: MAGIC,
        version,
    };
    codec().serialize_into(&mut writer, &header)?;
    codec().serialize_into(&mut writer, payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads a payload written by [`write_versioned_snapshot`], rejecting files
/// whose header is missing or carries a version other than `expected_version`.
pub fn read_versioned_snapshot<P, T>(
    path: P,
    expected_version: u32,
) -> Result<T, CheckpointError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(File::open(path)?);
    let header: Header = codec()
        .deserialize_from(&mut reader)
        .map_err(|_| CheckpointError::NotAWeightsFile)?;
    if header.magic != MAGIC {
        return Err(CheckpointError::NotAWeightsFile);
    }
    if header.version != expected_version {
        return Err(CheckpointError::VersionMismatch {
            expected: expected_version,
            found: header.version,
        });
    }
    Ok(codec().deserialize_from(&mut reader)?)
}

/// Models whose parameters can be written to and restored from a weights file.
pub trait Checkpointable: Sized {
    /// Format version written into the header.
    const VERSION: u32;

    type Snapshot: Serialize + DeserializeOwned;

    fn snapshot(&self) -> Self::Snapshot;

    /// Rebuilds the model, validating parameter shapes.
    fn restore(snapshot: Self::Snapshot) -> Result<Self, CheckpointError>;

    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        write_versioned_snapshot(path, Self::VERSION, &self.snapshot())
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        Self::restore(read_versioned_snapshot(path, Self::VERSION)?)
    }
}
